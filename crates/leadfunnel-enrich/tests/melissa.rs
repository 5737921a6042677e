//! Integration tests for `MelissaClient` using wiremock HTTP mocks.

use std::time::Duration;

use leadfunnel_core::Address;
use leadfunnel_enrich::{MelissaClient, PropertySource};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn address() -> Address {
    Address {
        street: "123 Main St".to_string(),
        city: "Austin".to_string(),
        state: "TX".to_string(),
        zip: "78701".to_string(),
        lat: 30.2672,
        lng: -97.7431,
        place_id: "p-1".to_string(),
        formatted_address: String::new(),
    }
}

#[tokio::test]
async fn lookup_parses_valuation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/LookupProperty"))
        .and(query_param("id", "lic-1"))
        .and(query_param("format", "json"))
        .and(query_param("ff", "123 Main St, Austin, TX 78701"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "TotalRecords": "1",
            "TransmissionResults": "",
            "Records": [{
                "Results": "YS01,YS02",
                "PrimaryOwner": { "Name1Full": "DOE JANE" },
                "EstimatedValue": { "EstimatedValue": "350000", "EstimatedMaxValue": "372000" },
                "IntRoomInfo": { "BedroomsCount": "3", "BathCount": "2" },
                "PropertySize": { "AreaBuilding": "1850" },
                "CurrentDeed": { "MortgageAmount": "210000" }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = MelissaClient::with_base_url("lic-1", 5, &server.uri()).unwrap();
    let record = client.lookup(&address()).await.expect("record");

    assert_eq!(record.estimated_value, 350_000);
    assert_eq!(record.max_value, 372_000);
    assert_eq!(record.equity, 140_000);
    assert_eq!(record.equity_percentage, 40);
    assert_eq!(record.owner_name, "DOE JANE");
    assert_eq!(record.bedrooms, 3);
    assert_eq!(record.square_footage, 1_850);
}

#[tokio::test]
async fn no_records_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/LookupProperty"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "TotalRecords": "0", "Records": [] })),
        )
        .mount(&server)
        .await;

    let client = MelissaClient::with_base_url("lic-1", 5, &server.uri()).unwrap();
    assert!(client.try_lookup(&address()).await.unwrap().is_none());
    assert!(client.lookup(&address()).await.is_none());
}

#[tokio::test]
async fn server_error_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/LookupProperty"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = MelissaClient::with_base_url("lic-1", 5, &server.uri()).unwrap();
    assert!(client.try_lookup(&address()).await.is_err());
    assert!(client.lookup(&address()).await.is_none());
}

#[tokio::test]
async fn timeout_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/LookupProperty"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "Records": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = MelissaClient::with_base_url("lic-1", 1, &server.uri()).unwrap();
    let err = client.try_lookup(&address()).await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    assert!(client.lookup(&address()).await.is_none());
}
