mod common;

#[cfg(all(feature = "config", feature = "naming"))]
#[cfg(test)]
mod session_tests {
    use std::time::Duration;

    use nacos_binding::api::config::ConfigClientBuilder;
    use nacos_binding::api::error::Error;
    use nacos_binding::api::naming::{NacosServiceInstance, NamingClientBuilder};
    use nacos_binding::api::props::ClientOptions;
    use nacos_binding::api::remote::{register_transport, unregister_transport, SessionState};

    use crate::common::{self, wait_until, MockNacosServer};

    #[tokio::test]
    async fn test_clients_share_one_session() {
        common::setup_log();
        let server = MockNacosServer::new();
        let options = common::options("session-shared");

        let config = ConfigClientBuilder::new(options.clone())
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        let naming = NamingClientBuilder::new(options.clone())
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        let config_again = ConfigClientBuilder::new(options.clone())
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        assert_eq!(server.opened(), 1);
        assert_eq!(config.session_state(), SessionState::Connected);
        assert_eq!(naming.session_state(), SessionState::Connected);

        config.publish_config("todo-dataid", "LOVE", "v1", None).await.unwrap();
        naming
            .register_instance("todo-service", "LOVE", NacosServiceInstance::new("127.0.0.1", 8080))
            .await
            .unwrap();
        assert_eq!(
            config_again.get_config("todo-dataid", "LOVE", None).await.unwrap(),
            "v1"
        );

        let _other = ConfigClientBuilder::new(options.namespace("todo-other-namespace"))
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        assert_eq!(server.opened(), 2);
    }

    #[tokio::test]
    async fn test_session_released_with_last_client() {
        let server = MockNacosServer::new();
        let options = common::options("session-release");

        let first = ConfigClientBuilder::new(options.clone())
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        let clone = first.clone();
        drop(first);
        assert_eq!(clone.session_state(), SessionState::Connected);
        drop(clone);

        let _second = ConfigClientBuilder::new(options)
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();
        assert_eq!(server.opened(), 2);
    }

    #[test]
    fn test_bad_credentials_fail_construction() {
        let server = MockNacosServer::with_credentials("nacos", "nacos");

        let ret = ConfigClientBuilder::new(
            common::options("session-auth").username("nacos").password("wrong"),
        )
        .transport(server.clone())
        .build();
        assert!(matches!(ret, Err(Error::Auth(_))));

        let client = ConfigClientBuilder::new(
            common::options("session-auth").username("nacos").password("nacos"),
        )
        .transport(server.clone())
        .build()
        .unwrap();
        assert!(client.publish_config("todo-dataid", "LOVE", "v1", None).unwrap());
        assert_eq!(client.get_config("todo-dataid", "LOVE", None).unwrap(), "v1");
    }

    #[test]
    fn test_anonymous_client_rejected_by_secured_server() {
        let server = MockNacosServer::with_credentials("nacos", "nacos");
        let client = ConfigClientBuilder::new(common::options("session-anonymous"))
            .transport(server)
            .build()
            .unwrap();

        let ret = client.get_config("todo-dataid", "LOVE", None);
        assert!(matches!(ret, Err(Error::Auth(_))));
    }

    #[test]
    fn test_unreachable_server() {
        let server = MockNacosServer::new();
        server.set_accepting(false);

        let ret = NamingClientBuilder::new(common::options("session-unreachable"))
            .transport(server)
            .build();
        assert!(matches!(ret, Err(Error::Connection(_))));
    }

    #[test]
    fn test_registered_transport() {
        let options = ClientOptions::new("mock-session-registered:8848", "");
        let ret = ConfigClientBuilder::new(options.clone()).build();
        assert!(matches!(ret, Err(Error::Connection(_))));

        let server = MockNacosServer::new();
        register_transport(options.get_server_addr(), server.clone());
        let client = ConfigClientBuilder::new(options.clone()).build().unwrap();
        client.publish_config("todo-dataid", "LOVE", "v1", None).unwrap();
        assert_eq!(server.request_count("ConfigPublishRequest"), 1);
        assert!(unregister_transport(options.get_server_addr()).is_some());
    }

    #[tokio::test]
    async fn test_reconnect_after_link_lost() {
        let server = MockNacosServer::new();
        let client = NamingClientBuilder::new(common::options("session-reconnect"))
            .transport(server.clone())
            .build_async()
            .await
            .unwrap();

        server.set_accepting(false);
        server.kill_links();
        assert!(
            wait_until(Duration::from_secs(3), || client.session_state() == SessionState::Reconnecting).await
        );

        // calls wait for the session until their deadline
        let ret = client
            .with_timeout(Duration::from_millis(300))
            .get_all_instances("todo-service", "LOVE", Vec::new(), false)
            .await;
        assert!(matches!(ret, Err(Error::Connection(_))));

        server.set_accepting(true);
        assert!(
            wait_until(Duration::from_secs(8), || client.session_state() == SessionState::Connected).await
        );
        assert_eq!(server.live_links(), 1);
        assert!(client
            .get_all_instances("todo-service", "LOVE", Vec::new(), false)
            .await
            .unwrap()
            .is_empty());
    }
}
