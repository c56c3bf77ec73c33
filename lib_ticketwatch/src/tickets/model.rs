use serde::{Deserialize, Serialize};

/// # Ticket
///
/// One open helpdesk ticket as it is cached and sent to viewers. A ticket with
/// an empty `assigned_resource_id` is unassigned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    #[serde(rename = "assignedResourceID")]
    pub assigned_resource_id: String,
    #[serde(rename = "createDate")]
    pub create_date: String,
    pub description: String,
    pub title: String,
}

impl Ticket {
    pub fn is_unassigned(&self) -> bool {
        self.assigned_resource_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_field_names() {
        let ticket = Ticket {
            id: 42,
            assigned_resource_id: "29682885".to_string(),
            create_date: "2024-05-01T13:00:00Z".to_string(),
            description: "Printer on fire".to_string(),
            title: "Printer".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&ticket).unwrap(),
            json!({
                "id": 42,
                "assignedResourceID": "29682885",
                "createDate": "2024-05-01T13:00:00Z",
                "description": "Printer on fire",
                "title": "Printer"
            })
        );
    }

    #[test]
    fn test_unassigned_means_empty_resource() {
        let mut ticket = Ticket::default();
        assert!(ticket.is_unassigned());

        ticket.assigned_resource_id = "7".to_string();
        assert!(!ticket.is_unassigned());
    }
}
