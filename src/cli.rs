//! Interface de linha de comando do statusgate baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] para administrar status
//! e transições, registrar entidades, pedir mudanças de status e decidir
//! pedidos pendentes, além das flags globais (--config, --data, --json, --verbose).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

/// statusgate — Workflow de aprovação de status para back-office de compras.
#[derive(Debug, Parser)]
#[command(name = "statusgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração TOML.
    #[arg(long, global = true, env = "STATUSGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Caminho do snapshot JSON (sobrepõe `data_path` da configuração).
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    /// Imprime resultados em JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Identifica uma entidade pelo par (tipo, id).
#[derive(Debug, Clone, Args)]
pub struct EntityArgs {
    /// Tipo da entidade (ex.: purchase_requisition, quotation).
    pub entity_type: String,
    /// Identificador da entidade.
    pub entity_id: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Lista os status configurados, de um tipo ou de todos.
    Statuses {
        entity_type: Option<String>,
    },

    /// Administra status (criar, editar, ativar, desativar, remover).
    #[command(subcommand)]
    Status(StatusCommand),

    /// Administra a tabela de transições.
    #[command(subcommand)]
    Transition(TransitionCommand),

    /// Passa a acompanhar uma entidade no status inicial do seu workflow.
    Track(EntityArgs),

    /// Pede a mudança de status de uma entidade.
    Request {
        #[command(flatten)]
        entity: EntityArgs,
        /// Status desejado.
        to: String,
        /// Quem está pedindo.
        #[arg(long)]
        by: String,
        /// Justificativa do pedido.
        #[arg(long)]
        reason: Option<String>,
    },

    /// Aprova ou rejeita um pedido pendente.
    Decide {
        request_id: Uuid,
        #[arg(long, conflicts_with = "reject", required_unless_present = "reject")]
        approve: bool,
        #[arg(long)]
        reject: bool,
        /// Quem está decidindo.
        #[arg(long)]
        by: String,
        #[arg(long)]
        comment: Option<String>,
    },

    /// Lista pedidos pendentes, do mais antigo para o mais novo.
    Pending {
        #[arg(long = "type")]
        entity_type: Option<String>,
        /// Continua a listagem após este `seq`.
        #[arg(long)]
        after: Option<u64>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Mostra um pedido.
    Show { request_id: Uuid },

    /// Mostra o status atual de uma entidade.
    Current(EntityArgs),

    /// Mostra o histórico de pedidos de uma entidade.
    History(EntityArgs),

    /// Lista entidades acompanhadas e seus status.
    Tracked {
        #[arg(long = "type")]
        entity_type: Option<String>,
    },

    /// Executa a demonstração embutida do workflow (em memória).
    Demo,
}

#[derive(Debug, Subcommand)]
pub enum StatusCommand {
    /// Cria um status.
    Add {
        entity_type: String,
        name: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
        /// Cria o status já inativo.
        #[arg(long, default_value_t = false)]
        inactive: bool,
    },
    /// Edita rótulo, cor ou ícone.
    Edit {
        entity_type: String,
        name: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    Enable { entity_type: String, name: String },
    Disable { entity_type: String, name: String },
    /// Remove um status que não é referenciado.
    Remove { entity_type: String, name: String },
}

#[derive(Debug, Subcommand)]
pub enum TransitionCommand {
    Allow { entity_type: String, from: String, to: String },
    Forbid { entity_type: String, from: String, to: String },
}

impl Command {
    /// Indica se o comando altera o estado e portanto exige salvar o snapshot.
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Command::Status(_)
                | Command::Transition(_)
                | Command::Track(_)
                | Command::Request { .. }
                | Command::Decide { .. }
        )
    }
}
