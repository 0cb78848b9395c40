use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};

use super::lineproto::{escape_tag, join_tag, Line};
use super::{classify, error_message, Backend, BackendError};
use crate::config;
use crate::point::Point;
use crate::{debug, info};

/// InfluxDB client writing structured points, one request per batch.
#[derive(Default)]
pub struct InfluxDb {
    client: Option<Client>,
    url: String,
    username: String,
    password: String,
    value_field: String,
    no_array: bool,
}

/// A measurement with its tags and fields, before serialization.
#[derive(Debug, PartialEq, Eq)]
struct InfluxPoint {
    measurement: String,
    tags: BTreeMap<&'static str, String>,
    fields: BTreeMap<String, i64>,
    time: i64,
}

impl InfluxPoint {
    fn new(point: &Point, value_field: &str, no_array: bool) -> Self {
        let mut tags = BTreeMap::new();

        let mut text = |name, value: &str| {
            if !value.is_empty() {
                tags.insert(name, escape_tag(value));
            }
        };

        text("vcenter", &point.vcenter);
        text("type", &point.object_type);
        text("name", &point.object_name);
        text("host", &point.esxi);
        text("cluster", &point.cluster);
        text("instance", &point.instance);
        text("resourcepool", &point.resource_pool);
        text("folder", &point.folder);

        for (name, values) in [
            ("datastore", &point.datastore),
            ("network", &point.network),
            ("vitags", &point.vitags),
        ] {
            if !values.is_empty() {
                tags.insert(name, join_tag(values, no_array));
            }
        }

        if point.num_cpu != 0 {
            tags.insert("numcpu", point.num_cpu.to_string());
        }
        if point.memory_size_mb != 0 {
            tags.insert("memorysizemb", point.memory_size_mb.to_string());
        }

        Self {
            measurement: point.measurement(),
            tags,
            fields: BTreeMap::from([(value_field.to_string(), point.value)]),
            time: point.timestamp,
        }
    }

    fn line(&self) -> Line {
        let line = self
            .tags
            .iter()
            .fold(Line::new(&self.measurement, self.time), |line, (name, value)| {
                line.tag(name, value.clone())
            });

        self.fields
            .iter()
            .fold(line, |line, (name, value)| line.field(name, *value))
    }
}

#[async_trait]
impl Backend for InfluxDb {
    fn name(&self) -> &'static str {
        "influxdb"
    }

    async fn initialize(&mut self, config: &config::Backend) -> Result<(), BackendError> {
        info!("initializing influxdb backend");

        self.client = Some(Client::builder().build()?);
        self.url = format!(
            "{}/write?db={}&precision=s",
            config.base_url(),
            config.database()
        );
        self.username = config.username().to_string();
        self.password = config.password().to_string();
        self.value_field = config.value_field().to_string();
        self.no_array = config.no_array();

        Ok(())
    }

    async fn send_batch(&mut self, points: &[Point]) -> Result<(), BackendError> {
        let Some(client) = &self.client else {
            return Err(BackendError::NotInitialized);
        };

        if points.is_empty() {
            return Ok(());
        }

        let body = points
            .iter()
            .map(|p| InfluxPoint::new(p, &self.value_field, self.no_array).line().to_string())
            .collect::<Vec<_>>()
            .join("\n");

        let mut request = client
            .post(&self.url)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body);

        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }

        let response = request.send().await?;
        let status = response.status();

        if status != StatusCode::NO_CONTENT {
            let message = error_message(response).await?;
            return classify(status, message);
        }

        debug!(points = points.len(), "wrote batch to influxdb");

        Ok(())
    }

    async fn disconnect(&mut self) {
        info!("disconnecting from influxdb");
        self.client = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use axum::extract::State;
    use axum::http::{header, HeaderMap, StatusCode as HttpStatus};
    use axum::routing::post;
    use axum::Router;
    use std::sync::{Arc, Mutex};

    fn point() -> Point {
        Point {
            vcenter: "vc1".into(),
            object_type: "virtualmachine".into(),
            object_name: "web01".into(),
            group: "cpu".into(),
            counter: "usage".into(),
            rollup: "average".into(),
            value: 20,
            datastore: vec!["DS1".into(), "DS2".into()],
            network: vec!["VM Network".into()],
            num_cpu: 2,
            timestamp: 999,
            ..Default::default()
        }
    }

    #[test]
    fn structured_point_keeps_non_empty_tags() {
        let influx = InfluxPoint::new(&point(), "Value", false);

        assert_eq!(influx.measurement, "cpu_usage_average");
        assert_eq!(
            influx.tags.keys().copied().collect::<Vec<_>>(),
            vec!["datastore", "name", "network", "numcpu", "type", "vcenter"]
        );
        assert_eq!(influx.tags["datastore"], "DS1\\,DS2");
        assert_eq!(influx.tags["network"], "VM\\ Network");
        assert_eq!(influx.fields["Value"], 20);
    }

    #[test]
    fn no_array_reduces_to_first_element() {
        let influx = InfluxPoint::new(&point(), "Value", true);
        assert_eq!(influx.tags["datastore"], "DS1");
    }

    #[derive(Default)]
    struct Captured {
        bodies: Mutex<Vec<String>>,
        headers: Mutex<Vec<HeaderMap>>,
    }

    #[tokio::test]
    async fn batch_is_written_uncompressed() {
        let captured = Arc::new(Captured::default());

        let router = Router::new()
            .route(
                "/write",
                post(
                    |State(state): State<Arc<Captured>>, headers: HeaderMap, body: String| async move {
                        state.bodies.lock().unwrap().push(body);
                        state.headers.lock().unwrap().push(headers);
                        HttpStatus::NO_CONTENT
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let config = config::Backend::for_test(BackendKind::InfluxDb, "127.0.0.1", port);
        let mut backend = InfluxDb::default();
        backend.initialize(&config).await.unwrap();
        backend.send_batch(&[point(), point()]).await.unwrap();
        backend.disconnect().await;

        let bodies = captured.bodies.lock().unwrap();
        let line = "cpu_usage_average,datastore=DS1\\,DS2,name=web01,network=VM\\ Network,\
                    numcpu=2,type=virtualmachine,vcenter=vc1 Value=20i 999";
        assert_eq!(bodies[0], format!("{line}\n{line}"));

        let headers = captured.headers.lock().unwrap();
        assert!(headers[0].get(header::CONTENT_ENCODING).is_none());
        assert!(headers[0].get(header::AUTHORIZATION).is_some());
    }

    #[tokio::test]
    async fn missing_database_is_reported() {
        let router = Router::new().route(
            "/write",
            post(|| async {
                (
                    HttpStatus::NOT_FOUND,
                    r#"{"error":"database not found: \"vsphere\""}"#,
                )
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let config = config::Backend::for_test(BackendKind::InfluxDb, "127.0.0.1", port);
        let mut backend = InfluxDb::default();
        backend.initialize(&config).await.unwrap();

        let result = backend.send_batch(&[point()]).await;
        assert!(
            matches!(result, Err(BackendError::DatabaseNotFound(ref m)) if m == "database not found: \"vsphere\"")
        );
    }
}
