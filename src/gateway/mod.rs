//! Events gateway
//!
//! Builds the calendar/venue queries, executes them through the OData
//! client, and projects the responses into the flat output contract.

pub mod projection;

use crate::config::EventFilterCodes;
use crate::odata::{Expand, GatewayError, ODataClient, QueryOptions};
use self::projection::{EVENT_FIELDS, EVENT_RELATION_QUERY, PARENT_FIELDS};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Entity set holding the calendar-entry-to-venue mappings
pub const ENTITY_SET: &str = "cr6ef_calendarvenues";

/// Read-only gateway over the event calendar
pub struct EventsGateway {
    client: Arc<ODataClient>,
    filters: EventFilterCodes,
}

impl EventsGateway {
    pub fn new(client: Arc<ODataClient>, filters: EventFilterCodes) -> Self {
        Self { client, filters }
    }

    fn expand(&self) -> Expand {
        Expand {
            relation: EVENT_RELATION_QUERY.to_string(),
            select: EVENT_FIELDS.iter().map(|m| m.source.to_string()).collect(),
        }
    }

    fn parent_select(&self) -> Vec<String> {
        PARENT_FIELDS.iter().map(|m| m.source.to_string()).collect()
    }

    /// Query for the published calendar: fixed business-code filters joined
    /// with `and`, in a stable order.
    pub fn list_query(&self) -> QueryOptions {
        QueryOptions {
            select: Some(self.parent_select()),
            filter: vec![
                format!("cr6ef_entrytype eq {}", self.filters.entry_type),
                format!("statecode eq {}", self.filters.state),
                format!(
                    "{}/statuscode eq {}",
                    EVENT_RELATION_QUERY, self.filters.event_status
                ),
            ],
            expand: Some(self.expand()),
        }
    }

    /// Query for one directly addressed record. No lifecycle filters: a
    /// record asked for by id is returned whatever its state.
    pub fn single_query(&self) -> QueryOptions {
        QueryOptions {
            select: Some(self.parent_select()),
            filter: Vec::new(),
            expand: Some(self.expand()),
        }
    }

    /// Fetch and project the current calendar, in upstream order. Entries
    /// with no linked event are excluded.
    pub async fn fetch_list(&self) -> Result<Vec<Map<String, Value>>, GatewayError> {
        let records = self
            .client
            .fetch_collection(ENTITY_SET, &self.list_query())
            .await?;
        Ok(projection::project_list(&records))
    }

    /// Fetch one calendar entry by id. A missing linked event nulls the
    /// relation-scoped output keys rather than hiding the record.
    pub async fn fetch_one(&self, id: &str) -> Result<Map<String, Value>, GatewayError> {
        let record = self
            .client
            .fetch_record(ENTITY_SET, id, &self.single_query())
            .await?;
        let record = record
            .as_object()
            .ok_or_else(|| GatewayError::Transport("record body is not a JSON object".to_string()))?;
        Ok(projection::project_single(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenProvider;

    fn gateway(filters: EventFilterCodes) -> EventsGateway {
        let auth = Arc::new(TokenProvider::new(
            "tenant".to_string(),
            "client".to_string(),
            "secret".to_string(),
            "https://org.crm.dynamics.com".to_string(),
        ));
        let client = Arc::new(
            ODataClient::new(auth, "https://org.crm.dynamics.com/api/data/v9.2/".to_string())
                .unwrap(),
        );
        EventsGateway::new(client, filters)
    }

    #[test]
    fn test_list_query_string() {
        let query = gateway(EventFilterCodes::default())
            .list_query()
            .to_query_string();
        assert_eq!(
            query,
            "?$select=cr6ef_calendarvenueid,cr6ef_eventdate,cr6ef_categorycode\
             &$filter=cr6ef_entrytype eq 100000001 and statecode eq 0 \
             and cr6ef_Event/statuscode eq 4\
             &$expand=cr6ef_Event($select=cr6ef_eventoid,cr6ef_name,statuscode,_cr6ef_venue_value)"
        );
    }

    #[test]
    fn test_single_query_has_no_lifecycle_filters() {
        let query = gateway(EventFilterCodes::default()).single_query();
        assert!(query.filter.is_empty());
        let query_string = query.to_query_string();
        assert!(query_string.contains("$expand=cr6ef_Event("));
        assert!(!query_string.contains("$filter"));
    }

    #[test]
    fn test_filter_codes_come_from_config() {
        let gateway = gateway(EventFilterCodes {
            entry_type: 100000007,
            state: 1,
            event_status: 2,
        });

        let query = gateway.list_query().to_query_string();
        assert!(query.contains("cr6ef_entrytype eq 100000007"));
        assert!(query.contains("statecode eq 1"));
        assert!(query.contains("cr6ef_Event/statuscode eq 2"));
    }
}
