//! OSRM route provider tests against a local stub server.
//!
//! The stub answers a single request with a canned response, so no OSRM
//! instance is needed.

mod fixtures;

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use freight_corridor::config::MarketConfig;
use freight_corridor::model::UserId;
use freight_corridor::orchestrator::MatchOrchestrator;
use freight_corridor::osrm::{GeometryFormat, OsrmClient, OsrmConfig};
use freight_corridor::polyline::Polyline;
use freight_corridor::store::MemoryStore;
use freight_corridor::traits::RouteProvider;

use fixtures::*;

/// Serves one HTTP response and returns the request line it received.
fn stub_osrm(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header).unwrap() == 0 || header == "\r\n" {
                break;
            }
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
        request_line.trim_end().to_string()
    });

    (base_url, handle)
}

/// An address nothing listens on.
fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn client(base_url: String, geometries: GeometryFormat) -> OsrmClient {
    OsrmClient::new(OsrmConfig {
        base_url,
        timeout_secs: 2,
        geometries,
        ..OsrmConfig::default()
    })
    .unwrap()
}

fn geojson_body(route: &Polyline) -> String {
    let coordinates: Vec<String> = route
        .points()
        .iter()
        .map(|point| format!("[{},{}]", point.lng, point.lat))
        .collect();
    format!(
        r#"{{"code":"Ok","routes":[{{"distance":95000.0,"duration":4200.0,"geometry":{{"type":"LineString","coordinates":[{}]}}}}]}}"#,
        coordinates.join(",")
    )
}

fn assert_same_route(actual: &Polyline, expected: &Polyline) {
    assert_eq!(actual.len(), expected.len());
    for (a, b) in actual.points().iter().zip(expected.points()) {
        assert!((a.lat - b.lat).abs() < 1e-9 && (a.lng - b.lng).abs() < 1e-9, "{:?} != {:?}", a, b);
    }
}

#[test]
fn geojson_route_fetched() {
    let expected = bandeirantes_route();
    let (base_url, server) = stub_osrm("200 OK", geojson_body(&expected));
    let osrm = client(base_url, GeometryFormat::GeoJson);

    let route = osrm.fetch_route(SAO_PAULO.coord(), CAMPINAS.coord()).unwrap();
    assert_same_route(&route, &expected);

    let request_line = server.join().unwrap();
    assert_eq!(
        request_line,
        "GET /route/v1/driving/-46.633300,-23.550500;-47.062600,-22.909900?overview=full&geometries=geojson HTTP/1.1"
    );
}

#[test]
fn encoded_route_fetched() {
    let expected = bandeirantes_route();
    let body = format!(
        r#"{{"code":"Ok","routes":[{{"distance":95000.0,"geometry":"{}"}}]}}"#,
        expected.encode()
    );
    let (base_url, server) = stub_osrm("200 OK", body);
    let osrm = client(base_url, GeometryFormat::Polyline);

    let route = osrm.route_for(SAO_PAULO.coord(), CAMPINAS.coord());
    assert_same_route(&route, &expected);
    assert!(server.join().unwrap().contains("geometries=polyline"));
}

#[test]
fn server_error_falls_back_to_straight_line() {
    let (base_url, server) = stub_osrm("500 Internal Server Error", "{}".to_string());
    let osrm = client(base_url, GeometryFormat::GeoJson);

    let route = osrm.route_for(SAO_PAULO.coord(), CAMPINAS.coord());
    assert_eq!(route, Polyline::straight(SAO_PAULO.coord(), CAMPINAS.coord()));
    server.join().unwrap();
}

#[test]
fn no_route_code_falls_back() {
    let (base_url, server) = stub_osrm("200 OK", r#"{"code":"NoRoute","message":"Impossible route"}"#.to_string());
    let osrm = client(base_url, GeometryFormat::GeoJson);

    assert!(osrm.fetch_route(SAO_PAULO.coord(), SANTOS.coord()).is_err());
    server.join().unwrap();
}

#[test]
fn degenerate_geometry_falls_back() {
    let single = Polyline::new(vec![SAO_PAULO.coord()]);
    let (base_url, server) = stub_osrm("200 OK", geojson_body(&single));
    let osrm = client(base_url, GeometryFormat::GeoJson);

    let route = osrm.route_for(SAO_PAULO.coord(), CAMPINAS.coord());
    assert_eq!(route.len(), 2);
    server.join().unwrap();
}

#[test]
fn unreachable_server_falls_back() {
    let osrm = client(closed_port_url(), GeometryFormat::GeoJson);

    assert!(osrm.fetch_route(SAO_PAULO.coord(), CAMPINAS.coord()).is_err());
    let route = osrm.route_for(SAO_PAULO.coord(), CAMPINAS.coord());
    assert_eq!(route, Polyline::straight(SAO_PAULO.coord(), CAMPINAS.coord()));
}

#[test]
fn trip_published_while_routing_down() {
    let osrm = client(closed_port_url(), GeometryFormat::GeoJson);
    let market = MatchOrchestrator::new(MemoryStore::new(), osrm, MarketConfig::default());

    let trip = market
        .publish_trip(trip_request(UserId::new(), SAO_PAULO, CAMPINAS, 100.0))
        .unwrap();
    assert_eq!(
        trip.route,
        Some(Polyline::straight(SAO_PAULO.coord(), CAMPINAS.coord()))
    );
}

#[test]
fn trip_published_with_road_route() {
    let expected = bandeirantes_route();
    let (base_url, server) = stub_osrm("200 OK", geojson_body(&expected));
    let market = MatchOrchestrator::new(
        MemoryStore::new(),
        client(base_url, GeometryFormat::GeoJson),
        MarketConfig::default(),
    );

    let trip = market
        .publish_trip(trip_request(UserId::new(), SAO_PAULO, CAMPINAS, 100.0))
        .unwrap();
    server.join().unwrap();

    assert_same_route(trip.route.as_ref().unwrap(), &expected);
    let check = market
        .matcher()
        .match_trip(&trip, &CAIEIRAS.place(), &VALINHOS.place());
    assert!(check.matches);
}
