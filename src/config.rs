//! Configuração do statusgate carregada a partir de `statusgate.toml`.
//!
//! A struct [`AppConfig`] contém o caminho do snapshot, o formato de log e as
//! tabelas de workflow (status + transições) de cada tipo de entidade.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `STATUSGATE_DATA` tem precedência sobre o arquivo.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::engine::DEFAULT_EVENT_BUFFER;
use crate::entities::{PAYABLE_LEDGER, PRICE_LIST, PURCHASE_REQUISITION, QUOTATION};
use crate::error::WorkflowResult;
use crate::workflow::{ModelStatus, StatusRegistry};

/// Nome do arquivo procurado no diretório atual quando `--config` não é informado.
pub const DEFAULT_CONFIG_FILE: &str = "statusgate.toml";

/// Formato de saída dos logs estruturados.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Configuração de nível superior carregada de `statusgate.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Arquivo JSON onde registro, vínculos e ledger são persistidos.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Capacidade do canal de eventos de decisão.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Workflows usados para popular o registro na primeira execução.
    #[serde(default = "default_workflows")]
    pub workflows: Vec<WorkflowConfig>,
}

/// Tabela de status e transições de um tipo de entidade.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkflowConfig {
    pub entity_type: String,
    pub initial: String,
    pub statuses: Vec<StatusConfig>,
    /// `from = ["to", ...]`
    #[serde(default)]
    pub transitions: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusConfig {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

// Valor padrão para o snapshot: "statusgate.json".
fn default_data_path() -> PathBuf {
    PathBuf::from("statusgate.json")
}

fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

fn default_active() -> bool {
    true
}

// Workflow padrão de aprovação: rascunho → aguardando aprovação → aprovado/rejeitado.
fn approval_workflow(entity_type: &str) -> WorkflowConfig {
    let status = |name: &str, color: &str, icon: &str| StatusConfig {
        name: name.to_string(),
        label: None,
        color: Some(color.to_string()),
        icon: Some(icon.to_string()),
        active: true,
    };
    WorkflowConfig {
        entity_type: entity_type.to_string(),
        initial: "draft".to_string(),
        statuses: vec![
            status("draft", "gray", "pencil"),
            status("pending_approval", "yellow", "clock"),
            status("approved", "green", "check"),
            status("rejected", "red", "x"),
        ],
        transitions: BTreeMap::from([
            ("draft".to_string(), vec!["pending_approval".to_string()]),
            (
                "pending_approval".to_string(),
                vec!["approved".to_string(), "rejected".to_string()],
            ),
            ("rejected".to_string(), vec!["draft".to_string()]),
        ]),
    }
}

fn default_workflows() -> Vec<WorkflowConfig> {
    let mut workflows: Vec<WorkflowConfig> = [PURCHASE_REQUISITION, QUOTATION, PAYABLE_LEDGER]
        .into_iter()
        .map(approval_workflow)
        .collect();

    // Listas de preço são publicadas e depois arquivadas.
    let mut price_list = approval_workflow(PRICE_LIST);
    price_list.statuses.push(StatusConfig {
        name: "archived".to_string(),
        label: None,
        color: Some("gray".to_string()),
        icon: Some("archive".to_string()),
        active: true,
    });
    price_list
        .transitions
        .insert("approved".to_string(), vec!["archived".to_string()]);
    workflows.push(price_list);
    workflows
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            log_format: LogFormat::default(),
            event_buffer: default_event_buffer(),
            workflows: default_workflows(),
        }
    }
}

impl AppConfig {
    /// Carrega a configuração do caminho informado ou de `statusgate.toml`
    /// no diretório atual. Usa valores padrão se o arquivo padrão não existir;
    /// um caminho explícito inexistente é erro.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    bail!("config file {} does not exist", path.display());
                }
                Self::from_file(path)?
            }
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };

        // Variável de ambiente tem precedência sobre o arquivo para o snapshot.
        if let Ok(data) = std::env::var("STATUSGATE_DATA")
            && !data.is_empty()
        {
            config.data_path = PathBuf::from(data);
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Monta o registro de status a partir das tabelas de workflow.
    pub fn registry(&self) -> WorkflowResult<StatusRegistry> {
        let mut registry = StatusRegistry::new();
        for workflow in &self.workflows {
            let statuses = workflow
                .statuses
                .iter()
                .map(|s| {
                    let mut status = ModelStatus::new(&workflow.entity_type, &s.name);
                    if let Some(label) = &s.label {
                        status.label = label.clone();
                    }
                    if let Some(color) = &s.color {
                        status.color = color.clone();
                    }
                    status.icon = s.icon.clone();
                    status.is_active = s.active;
                    status
                })
                .collect();
            let transitions = workflow.transitions.iter().flat_map(|(from, targets)| {
                targets.iter().map(move |to| (from.clone(), to.clone()))
            });
            registry.register_workflow(&workflow.entity_type, &workflow.initial, statuses, transitions)?;
        }
        Ok(registry)
    }
}
