//! Saída de terminal do statusgate — tabelas coloridas ou JSON.
//!
//! Usa a crate `console` para estilização com cores. O [`Printer`] decide,
//! a partir da flag `--json`, se imprime texto formatado ou JSON.

use console::Style;
use serde::Serialize;

use crate::workflow::{DecisionEvent, EntityRef, ModelStatus, RequestState, StatusRequest};

/// Impressora de resultados para a CLI.
pub struct Printer {
    json: bool,
    // Verde para aprovados e status ativos.
    green: Style,
    // Vermelho para rejeitados e status inativos.
    red: Style,
    // Amarelo para pendentes.
    yellow: Style,
    dim: Style,
    bold: Style,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
            bold: Style::new().bold(),
        }
    }

    /// Imprime um valor em JSON quando `--json` foi passado; senão usa o texto dado.
    fn emit<T: Serialize + ?Sized>(&self, value: &T, text: impl FnOnce() -> String) {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
        } else {
            println!("{}", text());
        }
    }

    fn state_style(&self, state: RequestState) -> &Style {
        match state {
            RequestState::Pending => &self.yellow,
            RequestState::Approved => &self.green,
            RequestState::Rejected => &self.red,
        }
    }

    /// Linha única resumindo um pedido.
    pub fn request_line(&self, request: &StatusRequest) -> String {
        format!(
            "{:>4}  {}  {:<10} {}  {} → {}  {}",
            request.seq,
            request.id,
            self.state_style(request.state).apply_to(request.state),
            self.bold.apply_to(&request.entity),
            request.from_status,
            request.to_status,
            self.dim.apply_to(format!(
                "by {} at {}",
                request.requester,
                request.requested_at.format("%Y-%m-%d %H:%M")
            )),
        )
    }

    /// Bloco detalhado de um pedido.
    pub fn request_detail(&self, request: &StatusRequest) -> String {
        let mut lines = vec![
            format!("{} {}", self.bold.apply_to("Request"), request.id),
            format!("  entity:    {}", request.entity),
            format!("  change:    {} → {}", request.from_status, request.to_status),
            format!(
                "  state:     {}",
                self.state_style(request.state).apply_to(request.state)
            ),
            format!(
                "  requested: {} by {}",
                request.requested_at.to_rfc3339(),
                request.requester
            ),
        ];
        if let Some(reason) = &request.reason {
            lines.push(format!("  reason:    {reason}"));
        }
        if let (Some(resolver), Some(at)) = (&request.resolver, request.resolved_at) {
            lines.push(format!("  resolved:  {} by {resolver}", at.to_rfc3339()));
        }
        if let Some(comment) = &request.comment {
            lines.push(format!("  comment:   {comment}"));
        }
        lines.join("\n")
    }

    pub fn status_line(&self, status: &ModelStatus) -> String {
        let flag = if status.is_active {
            self.green.apply_to("active")
        } else {
            self.red.apply_to("inactive")
        };
        format!(
            "{:<22} {:<24} {:<8} {:<10} {}",
            status.name,
            status.label,
            status.color,
            status.icon.as_deref().unwrap_or("-"),
            flag
        )
    }

    pub fn event_line(&self, event: &DecisionEvent) -> String {
        let mark = match event.outcome {
            RequestState::Approved => self.green.apply_to("✓"),
            RequestState::Rejected => self.red.apply_to("✗"),
            RequestState::Pending => self.yellow.apply_to("…"),
        };
        format!(
            "  {mark} {} {} → {} {} by {}",
            event.entity,
            event.from_status,
            event.to_status,
            event.outcome,
            event.resolver
        )
    }

    pub fn print_request(&self, request: &StatusRequest) {
        self.emit(request, || self.request_detail(request));
    }

    pub fn print_requests(&self, requests: &[StatusRequest]) {
        self.emit(requests, || {
            if requests.is_empty() {
                return self.dim.apply_to("No requests.").to_string();
            }
            requests
                .iter()
                .map(|r| self.request_line(r))
                .collect::<Vec<_>>()
                .join("\n")
        });
    }

    pub fn print_statuses(&self, entity_type: &str, statuses: &[ModelStatus]) {
        self.emit(statuses, || {
            let mut lines = vec![self.bold.apply_to(entity_type).to_string()];
            lines.extend(statuses.iter().map(|s| format!("  {}", self.status_line(s))));
            lines.join("\n")
        });
    }

    pub fn print_status(&self, status: &ModelStatus) {
        self.emit(status, || self.status_line(status));
    }

    pub fn print_current(&self, entity: &EntityRef, status: &ModelStatus) {
        self.emit(status, || {
            format!("{} is {} ({})", entity, self.bold.apply_to(&status.label), status.name)
        });
    }

    pub fn print_event(&self, event: &DecisionEvent) {
        self.emit(event, || self.event_line(event));
    }

    pub fn print_tracked(&self, tracked: &[(EntityRef, String)]) {
        #[derive(Serialize)]
        struct Row<'a> {
            entity: &'a EntityRef,
            status: &'a str,
        }
        let rows: Vec<Row<'_>> = tracked
            .iter()
            .map(|(entity, status)| Row { entity, status })
            .collect();
        self.emit(&rows, || {
            if tracked.is_empty() {
                return self.dim.apply_to("No tracked entities.").to_string();
            }
            tracked
                .iter()
                .map(|(entity, status)| format!("{entity:<40} {status}"))
                .collect::<Vec<_>>()
                .join("\n")
        });
    }

    /// Mensagem simples de confirmação (omitida em modo JSON).
    pub fn note(&self, message: &str) {
        if !self.json {
            println!("  {} {message}", self.green.apply_to("✓"));
        }
    }

    /// Cabeçalho de seção usado pela demonstração.
    pub fn heading(&self, title: &str) {
        if !self.json {
            println!();
            println!("{}", self.yellow.apply_to(format!("─── {title} ───")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{StatusLedger, StatusRegistry};

    fn request() -> StatusRequest {
        let mut registry = StatusRegistry::new();
        registry
            .register_workflow(
                "quotation",
                "draft",
                vec![
                    ModelStatus::new("quotation", "draft"),
                    ModelStatus::new("quotation", "pending_approval"),
                ],
                vec![("draft".to_string(), "pending_approval".to_string())],
            )
            .unwrap();
        let mut ledger = StatusLedger::new();
        ledger
            .submit(
                &registry,
                &EntityRef::new("quotation", "42"),
                "draft",
                "pending_approval",
                "ana",
                Some("quotes attached".into()),
            )
            .unwrap()
            .clone()
    }

    #[test]
    fn request_line_mentions_entity_and_change() {
        let printer = Printer::new(false);
        let line = console::strip_ansi_codes(&printer.request_line(&request())).to_string();
        assert!(line.contains("quotation#42"));
        assert!(line.contains("draft → pending_approval"));
        assert!(line.contains("pending"));
        assert!(line.contains("by ana"));
    }

    #[test]
    fn request_detail_includes_reason() {
        let printer = Printer::new(false);
        let detail = console::strip_ansi_codes(&printer.request_detail(&request())).to_string();
        assert!(detail.contains("reason:    quotes attached"));
        assert!(!detail.contains("resolved:"));
    }

    #[test]
    fn status_line_flags_inactive() {
        let printer = Printer::new(false);
        let mut status = ModelStatus::new("quotation", "void").with_icon("ban");
        status.is_active = false;
        let line = console::strip_ansi_codes(&printer.status_line(&status)).to_string();
        assert!(line.starts_with("void"));
        assert!(line.contains("ban"));
        assert!(line.ends_with("inactive"));
    }

    #[test]
    fn event_line_shows_outcome() {
        let printer = Printer::new(false);
        let mut request = request();
        request.state = RequestState::Approved;
        request.resolver = Some("carla".into());
        request.resolved_at = Some(request.requested_at);
        let event = DecisionEvent::from_request(&request);

        let line = console::strip_ansi_codes(&printer.event_line(&event)).to_string();
        assert!(line.contains("quotation#42 draft → pending_approval approved by carla"));
    }
}
