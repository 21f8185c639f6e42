//! The procurement case under review.
//!
//! A `CaseRecord` is produced by intake (sample retrieval, manual entry or
//! pasted-text extraction), validated there, and then handed to exactly one
//! session which treats it as immutable.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::CaseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcurementMethod {
    OpenTender,
    LimitedTender,
    #[serde(rename = "single_source", alias = "single_tender")]
    SingleTender,
    Others,
}

impl ProcurementMethod {
    pub fn label(self) -> &'static str {
        match self {
            Self::OpenTender => "Open Tender",
            Self::LimitedTender => "Limited Tender",
            Self::SingleTender => "Single Tender",
            Self::Others => "Others",
        }
    }
}

/// One vendor's bid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub vendor_name: String,
    pub bid_amount: f64,
    pub is_msme: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_score: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub tender_id: String,
    pub title: String,
    #[serde(default)]
    pub department: String,
    pub estimated_value: f64,
    pub procurement_method: ProcurementMethod,
    #[serde(default)]
    pub publication_date: String,
    #[serde(default)]
    pub bid_opening_date: String,
    pub bids: Vec<Bid>,
    #[serde(default)]
    pub selected_vendor: String,
    #[serde(default)]
    pub selection_reason: String,
    #[serde(default)]
    pub documents_available: Vec<String>,
}

impl CaseRecord {
    /// Parse a case from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self, CaseError> {
        let case: Self =
            serde_json::from_str(json).map_err(|e| CaseError::Malformed(e.to_string()))?;
        case.validate()?;
        Ok(case)
    }

    /// Check the minimum a review needs: identity fields, at least one bid,
    /// non-negative amounts, and a bid opening that does not precede
    /// publication when both dates are ISO dates.
    pub fn validate(&self) -> Result<(), CaseError> {
        if self.tender_id.trim().is_empty() {
            return Err(CaseError::MissingField("tender_id"));
        }
        if self.title.trim().is_empty() {
            return Err(CaseError::MissingField("title"));
        }
        if !self.estimated_value.is_finite() || self.estimated_value < 0.0 {
            return Err(CaseError::NegativeValue(self.estimated_value));
        }
        if self.bids.is_empty() {
            return Err(CaseError::NoBids);
        }
        for bid in &self.bids {
            if bid.vendor_name.trim().is_empty() {
                return Err(CaseError::MissingField("bids.vendor_name"));
            }
            if !bid.bid_amount.is_finite() || bid.bid_amount < 0.0 {
                return Err(CaseError::NegativeBid {
                    vendor: bid.vendor_name.clone(),
                    amount: bid.bid_amount,
                });
            }
        }

        let publication = NaiveDate::parse_from_str(&self.publication_date, "%Y-%m-%d");
        let opening = NaiveDate::parse_from_str(&self.bid_opening_date, "%Y-%m-%d");
        if let (Ok(publication), Ok(opening)) = (publication, opening) {
            if opening < publication {
                return Err(CaseError::DatesOutOfOrder {
                    publication: self.publication_date.clone(),
                    opening: self.bid_opening_date.clone(),
                });
            }
        }
        Ok(())
    }

    /// The lowest-priced (L1) bid.
    pub fn lowest_bid(&self) -> Option<&Bid> {
        self.bids
            .iter()
            .min_by(|a, b| a.bid_amount.total_cmp(&b.bid_amount))
    }

    /// Days between publication and bid opening, when both are ISO dates.
    pub fn bidding_window_days(&self) -> Option<i64> {
        let publication = NaiveDate::parse_from_str(&self.publication_date, "%Y-%m-%d").ok()?;
        let opening = NaiveDate::parse_from_str(&self.bid_opening_date, "%Y-%m-%d").ok()?;
        Some((opening - publication).num_days())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_case() -> CaseRecord {
        CaseRecord {
            tender_id: "TENDER-2024-001".into(),
            title: "Supply of Computer Equipment for Government Schools".into(),
            department: "Department of Education".into(),
            estimated_value: 5_000_000.0,
            procurement_method: ProcurementMethod::LimitedTender,
            publication_date: "2024-01-15".into(),
            bid_opening_date: "2024-01-25".into(),
            bids: vec![
                Bid {
                    vendor_name: "ABC Technologies".into(),
                    bid_amount: 4_800_000.0,
                    is_msme: false,
                    technical_score: Some(85.0),
                },
                Bid {
                    vendor_name: "XYZ Computers".into(),
                    bid_amount: 5_100_000.0,
                    is_msme: true,
                    technical_score: Some(82.0),
                },
            ],
            selected_vendor: "ABC Technologies".into(),
            selection_reason: "Lowest bid".into(),
            documents_available: vec!["Tender Notice".into()],
        }
    }

    #[test]
    fn sample_case_is_valid() {
        assert!(sample_case().validate().is_ok());
    }

    #[test]
    fn parses_service_payload() {
        let json = r#"{
            "tender_id": "TENDER-2024-002",
            "title": "Annual Maintenance Contract for Office Equipment",
            "department": "Ministry of Finance",
            "estimated_value": 1500000,
            "procurement_method": "limited_tender",
            "publication_date": "2024-02-01",
            "bid_opening_date": "2024-02-20",
            "bids": [
                {"vendor_name": "ServicePro Systems", "bid_amount": 1400000, "is_msme": true, "technical_score": 88},
                {"vendor_name": "TechCare Solutions", "bid_amount": 1550000, "is_msme": false}
            ],
            "selected_vendor": "ServicePro Systems",
            "selection_reason": "L1 Bidder and MSME",
            "documents_available": ["Tender Notice", "Committee Approval"]
        }"#;
        let case = CaseRecord::from_json(json).unwrap();
        assert_eq!(case.bids.len(), 2);
        assert_eq!(case.bids[1].technical_score, None);
        assert_eq!(case.bidding_window_days(), Some(19));
    }

    #[test]
    fn single_source_wire_name() {
        let m: ProcurementMethod = serde_json::from_str("\"single_source\"").unwrap();
        assert_eq!(m, ProcurementMethod::SingleTender);
        let alias: ProcurementMethod = serde_json::from_str("\"single_tender\"").unwrap();
        assert_eq!(alias, ProcurementMethod::SingleTender);
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"single_source\"");
    }

    #[test]
    fn rejects_missing_bids() {
        let mut case = sample_case();
        case.bids.clear();
        assert_eq!(case.validate(), Err(CaseError::NoBids));
    }

    #[test]
    fn rejects_blank_tender_id() {
        let mut case = sample_case();
        case.tender_id = "  ".into();
        assert_eq!(case.validate(), Err(CaseError::MissingField("tender_id")));
    }

    #[test]
    fn rejects_negative_amounts() {
        let mut case = sample_case();
        case.bids[0].bid_amount = -10.0;
        assert!(matches!(case.validate(), Err(CaseError::NegativeBid { .. })));

        let mut case = sample_case();
        case.estimated_value = -1.0;
        assert_eq!(case.validate(), Err(CaseError::NegativeValue(-1.0)));
    }

    #[test]
    fn rejects_opening_before_publication() {
        let mut case = sample_case();
        case.bid_opening_date = "2024-01-10".into();
        assert!(matches!(
            case.validate(),
            Err(CaseError::DatesOutOfOrder { .. })
        ));
    }

    #[test]
    fn free_text_dates_are_not_ordered() {
        let mut case = sample_case();
        case.publication_date = "mid January".into();
        assert!(case.validate().is_ok());
        assert_eq!(case.bidding_window_days(), None);
    }

    #[test]
    fn malformed_json_is_a_case_error() {
        let err = CaseRecord::from_json("{\"tender_id\": 1}").unwrap_err();
        assert_eq!(err.error_kind(), "malformed");
    }

    #[test]
    fn lowest_bid_is_l1() {
        let case = sample_case();
        assert_eq!(case.lowest_bid().unwrap().vendor_name, "ABC Technologies");
    }
}
