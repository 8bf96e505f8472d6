use crate::error::QueryError;
use crate::incident::Incident;
use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Parameters for `GET /api/v1/incidents`. All filters are optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentQuery {
    pub page: u32,
    pub page_size: u32,
    /// Exact match
    pub incident_type: Option<String>,
    /// Exact match
    pub channel: Option<String>,
    /// Substring match on the address, trimmed before sending
    pub address_search: Option<String>,
    pub from_dispatched_at: Option<String>,
    pub to_dispatched_at: Option<String>,
    /// Sent as repeated `units` parameters
    pub units: Vec<String>,
}

impl Default for IncidentQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            incident_type: None,
            channel: None,
            address_search: None,
            from_dispatched_at: None,
            to_dispatched_at: None,
            units: Vec::new(),
        }
    }
}

impl IncidentQuery {
    pub fn for_page(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            ..Default::default()
        }
    }

    /// Reject page numbers or sizes below one.
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.page < 1 {
            return Err(QueryError::InvalidPage(self.page));
        }
        if self.page_size < 1 {
            return Err(QueryError::InvalidPageSize(self.page_size));
        }
        Ok(())
    }

    /// Encode as URL query pairs in a stable order. Empty filters are omitted.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ];

        push_non_empty(&mut pairs, "incident_type", self.incident_type.as_deref());
        push_non_empty(
            &mut pairs,
            "address_search",
            self.address_search.as_deref().map(str::trim),
        );
        push_non_empty(&mut pairs, "from_dispatched_at", self.from_dispatched_at.as_deref());
        push_non_empty(&mut pairs, "to_dispatched_at", self.to_dispatched_at.as_deref());
        push_non_empty(&mut pairs, "channel", self.channel.as_deref());

        for unit in &self.units {
            pairs.push(("units", unit.clone()));
        }

        pairs
    }
}

fn push_non_empty(pairs: &mut Vec<(&'static str, String)>, key: &'static str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        pairs.push((key, value.to_string()));
    }
}

/// One page of the incident collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentPage {
    /// Server order
    pub items: Vec<Incident>,
    /// Absent when the server did not report a count
    pub total: Option<u64>,
    pub page: u32,
    pub page_size: u32,
    /// Items dropped by validation
    #[serde(skip)]
    pub rejected: usize,
}

impl IncidentPage {
    pub fn total_pages(&self) -> Option<u32> {
        self.total.map(|total| total_pages(total, self.page_size))
    }

    /// Without a total, a full page is taken to mean more may follow.
    pub fn has_next(&self) -> bool {
        match self.total_pages() {
            Some(pages) => self.page < pages,
            None => self.items.len() as u64 >= u64::from(self.page_size),
        }
    }
}

pub fn total_pages(total: u64, page_size: u32) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let pages = total.div_ceil(page_size).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::tests::incident;

    #[test]
    fn test_defaults() {
        let query = IncidentQuery::default();
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 50);
        assert_eq!(
            query.to_query_pairs(),
            vec![("page", "1".to_string()), ("page_size", "50".to_string())]
        );
    }

    #[test]
    fn test_all_filters_encoded() {
        let query = IncidentQuery {
            page: 3,
            page_size: 25,
            incident_type: Some("MVA".to_string()),
            channel: Some("PRWC G".to_string()),
            address_search: Some("  Camelback ".to_string()),
            from_dispatched_at: Some("2025-09-01T00:00:00Z".to_string()),
            to_dispatched_at: Some("2025-09-30T00:00:00Z".to_string()),
            units: vec!["E12".to_string(), "L9".to_string()],
        };

        let pairs = query.to_query_pairs();
        assert!(pairs.contains(&("incident_type", "MVA".to_string())));
        assert!(pairs.contains(&("address_search", "Camelback".to_string())));
        assert!(pairs.contains(&("channel", "PRWC G".to_string())));
        assert!(pairs.contains(&("from_dispatched_at", "2025-09-01T00:00:00Z".to_string())));
        assert!(pairs.contains(&("to_dispatched_at", "2025-09-30T00:00:00Z".to_string())));

        let units: Vec<&String> = pairs
            .iter()
            .filter(|(k, _)| *k == "units")
            .map(|(_, v)| v)
            .collect();
        assert_eq!(units, vec!["E12", "L9"]);
    }

    #[test]
    fn test_blank_search_omitted() {
        let query = IncidentQuery {
            address_search: Some("   ".to_string()),
            incident_type: Some(String::new()),
            ..Default::default()
        };
        let pairs = query.to_query_pairs();
        assert!(pairs.iter().all(|(k, _)| *k != "address_search"));
        assert!(pairs.iter().all(|(k, _)| *k != "incident_type"));
    }

    #[test]
    fn test_validate() {
        assert!(IncidentQuery::for_page(1, 1).validate().is_ok());
        assert_eq!(
            IncidentQuery::for_page(0, 50).validate(),
            Err(QueryError::InvalidPage(0))
        );
        assert_eq!(
            IncidentQuery::for_page(1, 0).validate(),
            Err(QueryError::InvalidPageSize(0))
        );
        assert_eq!(
            QueryError::InvalidPageSize(0).to_string(),
            "page_size must be at least 1, got 0"
        );
    }

    #[test]
    fn test_page_math() {
        assert_eq!(total_pages(0, 50), 1);
        assert_eq!(total_pages(50, 50), 1);
        assert_eq!(total_pages(51, 50), 2);

        let with_total = IncidentPage {
            items: vec![incident(1, "2025-01-01T00:00:00Z")],
            total: Some(120),
            page: 2,
            page_size: 50,
            rejected: 0,
        };
        assert_eq!(with_total.total_pages(), Some(3));
        assert!(with_total.has_next());

        let full_without_total = IncidentPage {
            items: vec![incident(1, "2025-01-01T00:00:00Z"), incident(2, "2025-01-01T00:00:00Z")],
            total: None,
            page: 1,
            page_size: 2,
            rejected: 0,
        };
        assert!(full_without_total.has_next());

        let short_without_total = IncidentPage {
            items: vec![incident(1, "2025-01-01T00:00:00Z")],
            total: None,
            page: 1,
            page_size: 2,
            rejected: 0,
        };
        assert!(!short_without_total.has_next());
    }
}
