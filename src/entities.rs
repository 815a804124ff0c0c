//! Back-office records that go through the approval workflow.
//!
//! Only the fields needed to identify a record are modelled here; everything
//! else about them belongs to the admin screens.

use serde::{Deserialize, Serialize};

use crate::workflow::HasStatus;

pub const PURCHASE_REQUISITION: &str = "purchase_requisition";
pub const QUOTATION: &str = "quotation";
pub const PAYABLE_LEDGER: &str = "payable_ledger";
pub const PRICE_LIST: &str = "price_list";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequisition {
    pub number: String,
    pub requested_by: String,
    pub department: Option<String>,
}

impl HasStatus for PurchaseRequisition {
    fn entity_type(&self) -> &str {
        PURCHASE_REQUISITION
    }

    fn entity_id(&self) -> String {
        self.number.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: u64,
    pub supplier: String,
    /// Requisition this quotation answers, if any.
    pub requisition: Option<String>,
}

impl HasStatus for Quotation {
    fn entity_type(&self) -> &str {
        QUOTATION
    }

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayableLedger {
    pub id: u64,
    pub account_code: String,
    pub currency: String,
}

impl HasStatus for PayableLedger {
    fn entity_type(&self) -> &str {
        PAYABLE_LEDGER
    }

    fn entity_id(&self) -> String {
        self.id.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceList {
    pub code: String,
    pub currency: String,
}

impl HasStatus for PriceList {
    fn entity_type(&self) -> &str {
        PRICE_LIST
    }

    fn entity_id(&self) -> String {
        self.code.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::engine::ApprovalEngine;
    use crate::workflow::EntityRef;

    #[test]
    fn entity_refs() {
        let quotation = Quotation {
            id: 31,
            supplier: "ACME".into(),
            requisition: Some("PR-2024-001".into()),
        };
        assert_eq!(quotation.entity_ref(), EntityRef::new("quotation", "31"));

        let price_list = PriceList {
            code: "PL-BRL".into(),
            currency: "BRL".into(),
        };
        assert_eq!(price_list.entity_ref().to_string(), "price_list#PL-BRL");
    }

    #[tokio::test]
    async fn domain_records_flow_through_engine() {
        let engine = ApprovalEngine::new(AppConfig::default().registry().unwrap());
        let requisition = PurchaseRequisition {
            number: "PR-2024-001".into(),
            requested_by: "ana".into(),
            department: Some("procurement".into()),
        };
        let ledger = PayableLedger {
            id: 9,
            account_code: "2.1.01".into(),
            currency: "USD".into(),
        };

        engine.track(&requisition).await.unwrap();
        engine.track(&ledger).await.unwrap();
        let request = engine
            .request_change(&requisition, "pending_approval", "ana", None)
            .await
            .unwrap();
        engine.decide(request.id, true, "carla", None).await.unwrap();

        let view = engine.projection();
        assert_eq!(view.current_status(&requisition).await.unwrap().name, "pending_approval");
        assert_eq!(view.current_status(&ledger).await.unwrap().name, "draft");
        assert_eq!(
            view.current_status(&requisition.entity_ref()).await.unwrap().name,
            "pending_approval"
        );
    }
}
