//! Pod delete handler
//!
//! Removes the pod behind a monitoring client whose keepalive expired.
//! Every failure is reported and swallowed.

use kubecheck_client::KubeClient;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct Event {
    client: EventClient,
}

#[derive(Debug, Deserialize)]
struct EventClient {
    name: String,
}

/// Pod name carried by a monitoring event
pub fn pod_name_from_event(json: &str) -> Result<String, serde_json::Error> {
    let event: Event = serde_json::from_str(json)?;
    Ok(event.client.name)
}

/// Pod name from the command line, or from the event on stdin
pub fn resolve_pod_name(name: Option<String>) -> Result<String, String> {
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        return Ok(name);
    }
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| format!("unable to read event: {}", e))?;
    pod_name_from_event(&input).map_err(|e| format!("invalid event: {}", e))
}

/// Delete the pod and describe what happened
pub async fn delete_pod(client: &KubeClient, name: &str, namespace: &str) -> String {
    match client.delete_pod(name, namespace).await {
        Ok(()) => format!("Deleted pod {}/{}", namespace, name),
        Err(e) => {
            tracing::warn!("Failed to delete pod {}/{}: {}", namespace, name, e);
            format!("Unable to delete pod {}/{}: {}", namespace, name, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_name_from_event() {
        let json = r#"{"client":{"name":"web-7d9f","address":"10.0.0.5"},"check":{"name":"keepalive"}}"#;
        assert_eq!(pod_name_from_event(json).unwrap(), "web-7d9f");
    }

    #[test]
    fn test_event_without_client() {
        assert!(pod_name_from_event(r#"{"check":{"name":"keepalive"}}"#).is_err());
        assert!(pod_name_from_event("not json").is_err());
    }

    #[test]
    fn test_explicit_name_wins() {
        assert_eq!(resolve_pod_name(Some("web-0".to_string())).unwrap(), "web-0");
    }
}
