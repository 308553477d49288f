//! Test utilities for spinning up a real Neo4j instance via testcontainers.

use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use canvass_core::config::GraphConfig;

use crate::Neo4jStore;

/// Start Neo4j with the Graph Data Science plugin and connect a store.
///
/// The container stops when the handle is dropped, so callers hold it for
/// the whole test.
pub async fn neo4j_container() -> (ContainerAsync<GenericImage>, Neo4jStore) {
    let image = GenericImage::new("neo4j", "5.25.1")
        .with_exposed_port(ContainerPort::Tcp(7687))
        .with_wait_for(WaitFor::message_on_stdout("Started."))
        .with_env_var("NEO4J_AUTH", "neo4j/canvass-test")
        .with_env_var("NEO4J_PLUGINS", "[\"graph-data-science\"]")
        .with_env_var("NEO4J_dbms_security_procedures_unrestricted", "gds.*");

    let container = image.start().await.expect("Failed to start Neo4j container");
    let port = container
        .get_host_port_ipv4(7687)
        .await
        .expect("Failed to get Neo4j host port");

    let config = GraphConfig {
        uri: format!("bolt://127.0.0.1:{port}"),
        password: "canvass-test".to_string(),
        ..GraphConfig::default()
    };
    let store = Neo4jStore::connect(&config)
        .await
        .expect("Failed to connect to Neo4j");

    (container, store)
}
