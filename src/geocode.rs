//! Google geocoding and distance-matrix lookups for zip codes.
//!
//! Transport and parsing are split: the `parse_*` functions take the decoded
//! JSON body so they can be exercised without network access.

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{DashboardError, Result};

pub const GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DISTANCE_MATRIX_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// One origin/destination leg, human-readable text plus raw units
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TravelLeg {
    pub distance: String,
    pub duration: String,
    pub distance_meters: u64,
    pub duration_seconds: u64,
}

pub struct GeocodeClient {
    http: Client,
    api_key: String,
    geocode_url: String,
    distance_url: String,
}

impl GeocodeClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            geocode_url: GEOCODE_URL.to_string(),
            distance_url: DISTANCE_MATRIX_URL.to_string(),
        }
    }

    /// Point both endpoints somewhere else (a local stub server, a proxy)
    pub fn with_base_urls(mut self, geocode_url: &str, distance_url: &str) -> Self {
        self.geocode_url = geocode_url.to_string();
        self.distance_url = distance_url.to_string();
        self
    }

    pub async fn geocode(&self, zipcode: &str) -> Result<LatLng> {
        debug!("Geocoding {}", zipcode);
        let body: Value = self
            .http
            .get(&self.geocode_url)
            .query(&[("address", zipcode), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_geocode_response(&body)
    }

    /// Geocode every zip; a failure only affects its own entry.
    pub async fn geocode_all(&self, zipcodes: &[String]) -> Vec<(String, Result<LatLng>)> {
        let mut out = Vec::with_capacity(zipcodes.len());
        for zip in zipcodes {
            let result = self.geocode(zip).await;
            if let Err(e) = &result {
                warn!("Geocoding {} failed: {}", zip, e);
            }
            out.push((zip.clone(), result));
        }
        out
    }

    pub async fn distance(&self, origin: &str, destination: &str) -> Result<TravelLeg> {
        debug!("Distance {} -> {}", origin, destination);
        let body: Value = self
            .http
            .get(&self.distance_url)
            .query(&[
                ("origins", origin),
                ("destinations", destination),
                ("units", "imperial"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_distance_response(&body)
    }

    pub async fn distances_from(
        &self,
        origin: &str,
        destinations: &[String],
    ) -> Vec<(String, Result<TravelLeg>)> {
        let mut out = Vec::with_capacity(destinations.len());
        for dest in destinations {
            let result = self.distance(origin, dest).await;
            if let Err(e) = &result {
                warn!("Distance {} -> {} failed: {}", origin, dest, e);
            }
            out.push((dest.clone(), result));
        }
        out
    }
}

fn check_status(body: &Value) -> Result<()> {
    match body.get("status").and_then(Value::as_str) {
        Some("OK") => Ok(()),
        Some(status) => {
            let detail = body
                .get("error_message")
                .and_then(Value::as_str)
                .map(|m| format!(": {}", m))
                .unwrap_or_default();
            Err(DashboardError::Geocode(format!("status {}{}", status, detail)))
        }
        None => Err(DashboardError::Geocode("response has no status".to_string())),
    }
}

/// First result's location from a geocode response body
pub fn parse_geocode_response(body: &Value) -> Result<LatLng> {
    check_status(body)?;
    let location = body
        .pointer("/results/0/geometry/location")
        .ok_or_else(|| DashboardError::Geocode("response has no location".to_string()))?;
    let lat = location.get("lat").and_then(Value::as_f64);
    let lng = location.get("lng").and_then(Value::as_f64);
    match (lat, lng) {
        (Some(lat), Some(lng)) => Ok(LatLng { lat, lng }),
        _ => Err(DashboardError::Geocode("location is not numeric".to_string())),
    }
}

/// First element of a distance-matrix response body
pub fn parse_distance_response(body: &Value) -> Result<TravelLeg> {
    check_status(body)?;
    let element = body
        .pointer("/rows/0/elements/0")
        .ok_or_else(|| DashboardError::Geocode("response has no elements".to_string()))?;

    if let Some(status) = element.get("status").and_then(Value::as_str) {
        if status != "OK" {
            return Err(DashboardError::Geocode(format!("element status {}", status)));
        }
    }

    let text = |field: &str| {
        element
            .pointer(&format!("/{}/text", field))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DashboardError::Geocode(format!("element has no {}", field)))
    };
    let value = |field: &str| {
        element
            .pointer(&format!("/{}/value", field))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };

    Ok(TravelLeg {
        distance: text("distance")?,
        duration: text("duration")?,
        distance_meters: value("distance"),
        duration_seconds: value("duration"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_geocode_ok() {
        let body = json!({
            "status": "OK",
            "results": [{
                "geometry": { "location": { "lat": 37.7485824, "lng": -122.4184108 } }
            }]
        });
        let loc = parse_geocode_response(&body).unwrap();
        assert_eq!(loc, LatLng { lat: 37.7485824, lng: -122.4184108 });
    }

    #[test]
    fn test_parse_geocode_zero_results() {
        let body = json!({ "status": "ZERO_RESULTS", "results": [] });
        let err = parse_geocode_response(&body).unwrap_err();
        assert!(matches!(err, DashboardError::Geocode(msg) if msg.contains("ZERO_RESULTS")));
    }

    #[test]
    fn test_parse_geocode_malformed() {
        let body = json!({ "status": "OK", "results": [{ "geometry": {} }] });
        assert!(matches!(parse_geocode_response(&body), Err(DashboardError::Geocode(_))));
        assert!(matches!(parse_geocode_response(&json!({})), Err(DashboardError::Geocode(_))));
    }

    #[test]
    fn test_parse_distance_ok() {
        let body = json!({
            "status": "OK",
            "rows": [{
                "elements": [{
                    "status": "OK",
                    "distance": { "text": "4.2 mi", "value": 6759 },
                    "duration": { "text": "14 mins", "value": 840 }
                }]
            }]
        });
        let leg = parse_distance_response(&body).unwrap();
        assert_eq!(leg.distance, "4.2 mi");
        assert_eq!(leg.duration, "14 mins");
        assert_eq!(leg.distance_meters, 6759);
        assert_eq!(leg.duration_seconds, 840);
    }

    #[test]
    fn test_parse_distance_element_not_found() {
        let body = json!({
            "status": "OK",
            "rows": [{ "elements": [{ "status": "NOT_FOUND" }] }]
        });
        assert!(matches!(parse_distance_response(&body), Err(DashboardError::Geocode(_))));
    }

    async fn stub_server() -> String {
        use axum::{extract::Query, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
        use std::collections::HashMap;

        async fn geocode(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
            match q.get("address").map(String::as_str) {
                Some("94110") => Json(json!({
                    "status": "OK",
                    "results": [{ "geometry": { "location": { "lat": 37.75, "lng": -122.42 } } }]
                })),
                _ => Json(json!({ "status": "ZERO_RESULTS", "results": [] })),
            }
        }

        async fn distance(Query(q): Query<HashMap<String, String>>) -> axum::response::Response {
            match q.get("destinations").map(String::as_str) {
                Some("94110") => Json(json!({
                    "status": "OK",
                    "rows": [{ "elements": [{
                        "status": "OK",
                        "distance": { "text": "1.9 mi", "value": 3058 },
                        "duration": { "text": "8 mins", "value": 480 }
                    }] }]
                }))
                .into_response(),
                _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            }
        }

        let app = Router::new()
            .route("/geocode", get(geocode))
            .route("/distance", get(distance));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn zips() -> Vec<String> {
        vec!["00000".to_string(), "94110".to_string(), "99999".to_string()]
    }

    #[tokio::test]
    async fn test_geocode_all_keeps_going_past_failures() {
        let base = stub_server().await;
        let client = GeocodeClient::new("test-key")
            .with_base_urls(&format!("{}/geocode", base), &format!("{}/distance", base));

        let located = client.geocode_all(&zips()).await;
        let order: Vec<&str> = located.iter().map(|(zip, _)| zip.as_str()).collect();
        assert_eq!(order, ["00000", "94110", "99999"]);
        assert!(matches!(&located[0].1, Err(DashboardError::Geocode(msg)) if msg.contains("ZERO_RESULTS")));
        assert_eq!(located[1].1.as_ref().unwrap(), &LatLng { lat: 37.75, lng: -122.42 });
        assert!(located[2].1.is_err());
    }

    #[tokio::test]
    async fn test_distances_from_isolates_http_errors() {
        let base = stub_server().await;
        let client = GeocodeClient::new("test-key")
            .with_base_urls(&format!("{}/geocode", base), &format!("{}/distance", base));

        let legs = client.distances_from("2000 Folsom St", &zips()).await;
        let order: Vec<&str> = legs.iter().map(|(zip, _)| zip.as_str()).collect();
        assert_eq!(order, ["00000", "94110", "99999"]);
        assert!(matches!(&legs[0].1, Err(DashboardError::Http(_))));
        let leg = legs[1].1.as_ref().unwrap();
        assert_eq!(leg.distance, "1.9 mi");
        assert_eq!(leg.duration_seconds, 480);
        assert!(legs[2].1.is_err());
    }

    #[test]
    fn test_request_denied_carries_message() {
        let body = json!({ "status": "REQUEST_DENIED", "error_message": "bad key" });
        let err = parse_distance_response(&body).unwrap_err();
        assert!(err.to_string().contains("bad key"));
    }
}
