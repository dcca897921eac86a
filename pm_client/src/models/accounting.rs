use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::null_as_default;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Credit,
    Debit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCategory {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expected_amount: Option<f64>,
    #[serde(default)]
    pub parent_category_id: Option<i64>,
    #[serde(default)]
    pub parent_category_title: Option<String>,
    #[serde(default)]
    pub sub_categories: Option<Vec<TransactionCategory>>,
}

impl TransactionCategory {
    /// This category followed by all of its descendants, depth first.
    pub fn flatten(&self) -> Vec<&TransactionCategory> {
        let mut out = vec![self];
        for sub in self.sub_categories.iter().flatten() {
            out.extend(sub.flatten());
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionCategoryRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_category_id: Option<i64>,
}

/// Partial update. Unset fields are left untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionCategoryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_category_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    #[serde(default)]
    pub import_label: Option<String>,
    #[serde(default)]
    pub custom_label: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub category: Option<TransactionCategory>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub related_transaction_id: Option<i64>,
    #[serde(default)]
    pub account_id: Option<i64>,
}

impl Transaction {
    /// Custom label when set, otherwise the label from the bank import.
    pub fn label(&self) -> &str {
        self.custom_label
            .as_deref()
            .filter(|l| !l.is_empty())
            .or(self.import_label.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountingSummary {
    pub income: f64,
    pub expense: f64,
    pub saving: f64,
    #[serde(default)]
    pub balance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    #[serde(default)]
    pub category: Option<TransactionCategory>,
    #[serde(default)]
    pub expense: f64,
    #[serde(default)]
    pub percent: f64,
    #[serde(default)]
    pub max_expected: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transactions: Vec<Transaction>,
}

/// One page of transactions still waiting for a category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UncategorizedTransactions {
    #[serde(default, deserialize_with = "null_as_default")]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_page: u32,
    #[serde(default)]
    pub total_elements: u64,
}

/// A bank statement line as uploaded by the CSV import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCsvRow {
    pub date: NaiveDate,
    pub amount: f64,
    pub description: String,
    pub current_balance: f64,
}

/// Free-form filter passed through as query parameters (period, category...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    params: Vec<(String, String)>,
}

impl TransactionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn between(self, start: NaiveDate, end: NaiveDate) -> Self {
        self.param("startDate", start).param("endDate", end)
    }

    /// Query pairs with `walletId` appended when a wallet is selected.
    pub fn into_pairs(self, wallet_id: Option<i64>) -> Vec<(String, String)> {
        let mut params = self.params;
        if let Some(id) = wallet_id {
            params.push(("walletId".to_string(), id.to_string()));
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_transaction_with_nested_category() {
        let tx: Transaction = serde_json::from_value(json!({
            "id": 5,
            "importLabel": "CB CARREFOUR",
            "customLabel": null,
            "amount": -42.5,
            "date": "2025-02-14",
            "category": {
                "id": 1, "title": "Food", "icon": null, "description": null,
                "expectedAmount": 300.0, "parentCategoryId": null,
                "parentCategoryTitle": null, "subCategories": null
            },
            "type": "DEBIT",
            "relatedTransactionId": null,
            "accountId": 3
        }))
        .unwrap();
        assert_eq!(tx.transaction_type, TransactionType::Debit);
        assert_eq!(tx.label(), "CB CARREFOUR");
        assert_eq!(tx.category.unwrap().expected_amount, Some(300.0));
    }

    #[test]
    fn flatten_walks_sub_categories() {
        let root: TransactionCategory = serde_json::from_value(json!({
            "id": 1, "title": "Home",
            "subCategories": [
                { "id": 2, "title": "Rent" },
                { "id": 3, "title": "Energy", "subCategories": [{ "id": 4, "title": "Power" }] }
            ]
        }))
        .unwrap();
        let ids: Vec<i64> = root.flatten().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn query_appends_wallet_last() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let pairs = TransactionQuery::new().between(start, end).into_pairs(Some(7));
        assert_eq!(
            pairs,
            vec![
                ("startDate".to_string(), "2025-01-01".to_string()),
                ("endDate".to_string(), "2025-01-31".to_string()),
                ("walletId".to_string(), "7".to_string()),
            ]
        );
        assert!(TransactionQuery::new().into_pairs(None).is_empty());
    }

    #[test]
    fn update_request_omits_unset_fields() {
        let req = UpdateTransactionCategoryRequest {
            title: Some("Groceries".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(req).unwrap(), json!({ "title": "Groceries" }));
    }
}
