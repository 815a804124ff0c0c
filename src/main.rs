use anyhow::{Context, Result};
use clap::Parser;

use statusgate::cli::{Cli, Command, EntityArgs, StatusCommand, TransitionCommand};
use statusgate::config::AppConfig;
use statusgate::entities::{PurchaseRequisition, Quotation};
use statusgate::store::SnapshotStore;
use statusgate::ui::Printer;
use statusgate::workflow::{EntityRef, ModelStatus, StatusPatch};
use statusgate::{ApprovalEngine, HasStatus, WorkflowError, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    telemetry::init(config.log_format, cli.verbose)?;
    let printer = Printer::new(cli.json);

    if matches!(cli.command, Command::Demo) {
        return run_demo(&config, &printer).await;
    }

    let store = SnapshotStore::new(cli.data.clone().unwrap_or_else(|| config.data_path.clone()));
    let mut lock = store.lock()?;
    // Held through load, command and save.
    let _guard = tokio::task::block_in_place(|| lock.acquire(cli.command.mutates()))
        .with_context(|| format!("failed to lock {}", store.lock_path().display()))?;
    let registry = config.registry().context("invalid workflow configuration")?;
    let state = store
        .load_or_seed(registry)
        .await
        .with_context(|| format!("failed to load {}", store.path().display()))?;
    let engine = ApprovalEngine::with_state(state, config.event_buffer);

    run_command(&cli.command, &engine, &printer).await?;

    if cli.command.mutates() {
        store
            .save(&engine.snapshot().await)
            .await
            .with_context(|| format!("failed to save {}", store.path().display()))?;
    }
    Ok(())
}

fn entity_ref(args: &EntityArgs) -> EntityRef {
    EntityRef::new(&args.entity_type, &args.entity_id)
}

async fn run_command(command: &Command, engine: &ApprovalEngine, printer: &Printer) -> Result<()> {
    let view = engine.projection();
    match command {
        Command::Statuses { entity_type } => {
            let types = match entity_type {
                Some(t) => vec![t.clone()],
                None => view.entity_types().await,
            };
            for entity_type in types {
                printer.print_statuses(&entity_type, &view.statuses(&entity_type).await);
            }
        }
        Command::Status(action) => run_status_command(action, engine, printer).await?,
        Command::Transition(TransitionCommand::Allow { entity_type, from, to }) => {
            engine.allow_transition(entity_type, from, to).await?;
            printer.note(&format!("{entity_type}: {from} → {to} allowed"));
        }
        Command::Transition(TransitionCommand::Forbid { entity_type, from, to }) => {
            if engine.forbid_transition(entity_type, from, to).await {
                printer.note(&format!("{entity_type}: {from} → {to} forbidden"));
            } else {
                printer.note(&format!("{entity_type}: {from} → {to} was not allowed"));
            }
        }
        Command::Track(args) => {
            let entity = entity_ref(args);
            let status = engine.track(&entity).await?;
            printer.print_current(&entity, &status);
        }
        Command::Request {
            entity,
            to,
            by,
            reason,
        } => {
            let request = engine
                .request_change(&entity_ref(entity), to, by, reason.clone())
                .await?;
            printer.print_request(&request);
        }
        Command::Decide {
            request_id,
            approve,
            by,
            comment,
            ..
        } => {
            let event = engine
                .decide(*request_id, *approve, by, comment.clone())
                .await?;
            printer.print_event(&event);
        }
        Command::Pending {
            entity_type,
            after,
            limit,
        } => {
            let mut cursor = view.list_pending(entity_type.as_deref()).resume_from(*after);
            let requests = match limit {
                Some(limit) => cursor.take(*limit).await,
                None => cursor.collect_all().await,
            };
            printer.print_requests(&requests);
        }
        Command::Show { request_id } => {
            printer.print_request(&view.get(*request_id).await?);
        }
        Command::Current(args) => {
            let entity = entity_ref(args);
            let status = view.current_status(&entity).await?;
            printer.print_current(&entity, &status);
        }
        Command::History(args) => {
            let history = view.history(&entity_ref(args)).collect_all().await;
            printer.print_requests(&history);
        }
        Command::Tracked { entity_type } => {
            printer.print_tracked(&view.tracked(entity_type.as_deref()).await);
        }
        Command::Demo => anyhow::bail!("demo runs in memory and takes no snapshot"),
    }
    Ok(())
}

async fn run_status_command(
    action: &StatusCommand,
    engine: &ApprovalEngine,
    printer: &Printer,
) -> Result<()> {
    match action {
        StatusCommand::Add {
            entity_type,
            name,
            label,
            color,
            icon,
            inactive,
        } => {
            let mut status = ModelStatus::new(entity_type, name);
            StatusPatch {
                label: label.clone(),
                color: color.clone(),
                icon: icon.clone(),
                is_active: Some(!inactive),
            }
            .apply(&mut status);
            engine.define_status(status.clone()).await?;
            printer.print_status(&status);
        }
        StatusCommand::Edit {
            entity_type,
            name,
            label,
            color,
            icon,
        } => {
            let patch = StatusPatch {
                label: label.clone(),
                color: color.clone(),
                icon: icon.clone(),
                is_active: None,
            };
            printer.print_status(&engine.update_status(entity_type, name, patch).await?);
        }
        StatusCommand::Enable { entity_type, name } => {
            printer.print_status(&engine.set_status_active(entity_type, name, true).await?);
        }
        StatusCommand::Disable { entity_type, name } => {
            printer.print_status(&engine.set_status_active(entity_type, name, false).await?);
        }
        StatusCommand::Remove { entity_type, name } => {
            let removed = engine.remove_status(entity_type, name).await?;
            printer.note(&format!("removed {}/{}", removed.entity_type, removed.name));
        }
    }
    Ok(())
}

/// In-memory walk through the approval workflow; nothing is persisted.
async fn run_demo(config: &AppConfig, printer: &Printer) -> Result<()> {
    let engine = ApprovalEngine::new(config.registry()?);
    let mut events = engine.subscribe();
    let view = engine.projection();

    let requisition = PurchaseRequisition {
        number: "PR-2024-001".into(),
        requested_by: "ana".into(),
        department: Some("procurement".into()),
    };
    let quotation = Quotation {
        id: 7,
        supplier: "ACME Supplies".into(),
        requisition: Some(requisition.number.clone()),
    };

    printer.heading("Tracking");
    for status in [engine.track(&requisition).await?, engine.track(&quotation).await?] {
        printer.print_status(&status);
    }

    printer.heading("Requests");
    let r1 = engine
        .request_change(&requisition, "pending_approval", "ana", Some("budget approved".into()))
        .await?;
    printer.print_request(&r1);
    match engine
        .request_change(&requisition, "pending_approval", "bruno", None)
        .await
    {
        Err(err @ WorkflowError::DuplicatePending { .. }) => printer.note(&format!("refused: {err}")),
        other => anyhow::bail!("expected a duplicate pending refusal, got {other:?}"),
    }
    let r2 = engine
        .request_change(&quotation, "pending_approval", "bruno", None)
        .await?;
    printer.print_requests(&view.list_pending(None).collect_all().await);

    printer.heading("Decisions");
    engine.decide(r1.id, true, "carla", None).await?;
    engine
        .decide(r2.id, false, "carla", Some("supplier not homologated".into()))
        .await?;
    while let Ok(event) = events.try_recv() {
        printer.print_event(&event);
    }

    printer.heading("Current status");
    for entity in [requisition.entity_ref(), quotation.entity_ref()] {
        printer.print_current(&entity, &view.current_status(&entity).await?);
    }

    printer.heading("History");
    printer.print_requests(&view.history(&requisition).collect_all().await);
    Ok(())
}
