//! Persistência do estado do workflow em um snapshot JSON.
//!
//! O [`SnapshotStore`] grava registro, vínculos e ledger em um único arquivo.
//! A escrita é feita em um arquivo temporário seguido de `rename`, para que
//! um snapshot parcialmente escrito nunca seja lido. Execuções concorrentes
//! sobre o mesmo arquivo são serializadas por um [`StoreLock`].

use std::fs::File;
use std::path::{Path, PathBuf};

use fd_lock::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::WorkflowState;
use crate::error::AppError;
use crate::workflow::{EntityRef, StatusLedger, StatusRegistry, StatusRequest};

/// Versão atual do formato do snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Um vínculo entidade → status serializável (chaves de mapa JSON precisam ser strings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub entity: EntityRef,
    pub status: String,
}

/// Formato em disco do estado completo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub registry: StatusRegistry,
    pub bindings: Vec<Binding>,
    pub requests: Vec<StatusRequest>,
}

impl Snapshot {
    pub fn capture(state: &WorkflowState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            registry: state.registry.clone(),
            bindings: state
                .bindings
                .iter()
                .map(|(entity, status)| Binding {
                    entity: entity.clone(),
                    status: status.clone(),
                })
                .collect(),
            requests: state.ledger.requests().to_vec(),
        }
    }

    /// Reconstrói o estado, validando versão, um pedido pendente por entidade,
    /// status dos vínculos existentes no registro e pedidos pendentes apenas
    /// para entidades rastreadas.
    pub fn restore(self) -> Result<WorkflowState, AppError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(AppError::Config(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }
        let state = WorkflowState {
            registry: self.registry,
            bindings: self
                .bindings
                .into_iter()
                .map(|b| (b.entity, b.status))
                .collect(),
            ledger: StatusLedger::from_requests(self.requests)?,
        };

        for (entity, status) in &state.bindings {
            if state.registry.status(&entity.entity_type, status).is_none() {
                return Err(AppError::Config(format!(
                    "{entity} is bound to unknown status {status}"
                )));
            }
        }
        if let Some(orphan) = state
            .ledger
            .requests()
            .iter()
            .find(|r| r.is_pending() && !state.bindings.contains_key(&r.entity))
        {
            return Err(AppError::Config(format!(
                "pending request {} targets untracked entity {}",
                orphan.id, orphan.entity
            )));
        }
        Ok(state)
    }
}

/// Trava de arquivo em `<data_path>.lock`, compartilhada entre processos.
pub struct StoreLock {
    file: RwLock<File>,
}

/// Mantém a trava enquanto o snapshot é carregado, alterado e gravado.
pub struct StoreGuard<'a> {
    _read: Option<RwLockReadGuard<'a, File>>,
    _write: Option<RwLockWriteGuard<'a, File>>,
}

impl StoreLock {
    /// Bloqueia até obter a trava: exclusiva para comandos que alteram o
    /// estado, compartilhada para leitura.
    pub fn acquire(&mut self, exclusive: bool) -> Result<StoreGuard<'_>, AppError> {
        if exclusive {
            Ok(StoreGuard {
                _read: None,
                _write: Some(self.file.write()?),
            })
        } else {
            Ok(StoreGuard {
                _read: Some(self.file.read()?),
                _write: None,
            })
        }
    }

    /// Como [`acquire`](Self::acquire), mas falha com `WouldBlock` em vez de esperar.
    pub fn try_acquire(&mut self, exclusive: bool) -> Result<StoreGuard<'_>, AppError> {
        if exclusive {
            Ok(StoreGuard {
                _read: None,
                _write: Some(self.file.try_write()?),
            })
        } else {
            Ok(StoreGuard {
                _read: Some(self.file.try_read()?),
                _write: None,
            })
        }
    }
}

/// Leitura e escrita assíncronas do snapshot em disco.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".lock");
        path.into()
    }

    /// Abre (criando se preciso) o arquivo de trava deste snapshot.
    pub fn lock(&self) -> Result<StoreLock, AppError> {
        let path = self.lock_path();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        Ok(StoreLock {
            file: RwLock::new(file),
        })
    }

    /// Retorna `None` se o arquivo ainda não existir.
    pub async fn load(&self) -> Result<Option<WorkflowState>, AppError> {
        if !tokio::fs::try_exists(&self.path).await? {
            debug!(path = %self.path.display(), "no snapshot yet");
            return Ok(None);
        }
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        debug!(
            path = %self.path.display(),
            requests = snapshot.requests.len(),
            bindings = snapshot.bindings.len(),
            "snapshot loaded"
        );
        snapshot.restore().map(Some)
    }

    /// Carrega o snapshot ou cria um estado novo a partir do registro informado.
    pub async fn load_or_seed(&self, registry: StatusRegistry) -> Result<WorkflowState, AppError> {
        Ok(self
            .load()
            .await?
            .unwrap_or_else(|| WorkflowState::new(registry)))
    }

    pub async fn save(&self, state: &WorkflowState) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(&Snapshot::capture(state))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "snapshot saved");
        Ok(())
    }
}
