#[cfg(test)]
mod tests {
    use crate::config::{ConfigResolver, EnvResolver, SshConfig, StaticResolver};
    use crate::error::SshMcpError;
    use crate::mcp_server::{call_tool, ToolCallParams};
    use crate::ssh_client::{CommandResult, MockRemoteExecutor};
    use crate::tools::{self, RunParams};
    use serde_json::{json, Value};

    fn resolver() -> StaticResolver {
        StaticResolver::new(SshConfig {
            host: "example.com".to_string(),
            port: 22,
            username: "deploy".to_string(),
            password: "hunter2".to_string(),
        })
    }

    fn output(exit_code: i32, stdout: &str, stderr: &str) -> CommandResult {
        CommandResult {
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            truncated: false,
        }
    }

    fn parse_text(text: &str) -> Value {
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_probe_runs_hostname_and_trims() {
        let mut executor = MockRemoteExecutor::new();
        executor
            .expect_execute()
            .withf(|config, command| config.host == "example.com" && command == "hostname")
            .times(1)
            .returning(|_, _| Ok(output(0, "web-01\n", "  \n")));

        let response = tools::ssh_test_connection(&resolver(), &executor).await;

        assert!(!response.is_error());
        let body = parse_text(response.first_text());
        assert_eq!(body["exitCode"], 0);
        assert_eq!(body["stdout"], "web-01");
        assert_eq!(body["stderr"], "");
        assert!(body.get("command").is_none());
    }

    #[tokio::test]
    async fn test_probe_text_is_pretty_printed() {
        let mut executor = MockRemoteExecutor::new();
        executor
            .expect_execute()
            .returning(|_, _| Ok(output(0, "web-01", "")));

        let response = tools::ssh_test_connection(&resolver(), &executor).await;
        assert_eq!(
            response.first_text(),
            "{\n  \"exitCode\": 0,\n  \"stdout\": \"web-01\",\n  \"stderr\": \"\"\n}"
        );
    }

    #[tokio::test]
    async fn test_probe_connection_failure_is_flagged() {
        let mut executor = MockRemoteExecutor::new();
        executor.expect_execute().returning(|_, _| {
            Err(SshMcpError::Connection("connect ECONNREFUSED 10.0.0.5:22".to_string()))
        });

        let response = tools::ssh_test_connection(&resolver(), &executor).await;

        assert!(response.is_error());
        assert_eq!(
            response.first_text(),
            "SSH connection failed: connect ECONNREFUSED 10.0.0.5:22"
        );
    }

    #[tokio::test]
    async fn test_config_failure_never_reaches_executor() {
        let mut executor = MockRemoteExecutor::new();
        executor.expect_execute().times(0);
        let resolver = EnvResolver::from_lookup(|_| None);

        let response = tools::ssh_test_connection(&resolver, &executor).await;

        assert!(response.is_error());
        assert!(response
            .first_text()
            .starts_with("SSH connection failed: Missing required environment variables: SSH_HOST, SSH_USERNAME, SSH_PASSWORD"));
    }

    #[tokio::test]
    async fn test_run_echoes_command() {
        let mut executor = MockRemoteExecutor::new();
        executor
            .expect_execute()
            .withf(|_, command| command == "echo hi")
            .returning(|_, _| Ok(output(0, "hi\n", "")));

        let params = RunParams::parse(json!({ "command": "echo hi" })).unwrap();
        let response = tools::ssh_run(params, &resolver(), &executor).await;

        assert!(!response.is_error());
        let body = parse_text(response.first_text());
        assert_eq!(body["command"], "echo hi");
        assert_eq!(body["exitCode"], 0);
        assert_eq!(body["stdout"], "hi");
    }

    #[tokio::test]
    async fn test_run_non_zero_exit_is_not_a_tool_error() {
        let mut executor = MockRemoteExecutor::new();
        executor
            .expect_execute()
            .returning(|_, _| Ok(output(3, "", "boom\n")));

        let params = RunParams::parse(json!({ "command": "exit 3" })).unwrap();
        let response = tools::ssh_run(params, &resolver(), &executor).await;

        assert!(!response.is_error());
        let body = parse_text(response.first_text());
        assert_eq!(body["exitCode"], 3);
        assert_eq!(body["stderr"], "boom");
    }

    #[tokio::test]
    async fn test_run_failure_uses_command_prefix() {
        let mut executor = MockRemoteExecutor::new();
        executor.expect_execute().returning(|_, _| {
            Err(SshMcpError::Execution("Channel creation failed: open failed".to_string()))
        });

        let params = RunParams::parse(json!({ "command": "uptime" })).unwrap();
        let response = tools::ssh_run(params, &resolver(), &executor).await;

        assert!(response.is_error());
        assert_eq!(
            response.first_text(),
            "SSH command failed: Channel creation failed: open failed"
        );
    }

    #[tokio::test]
    async fn test_run_reports_truncation() {
        let mut executor = MockRemoteExecutor::new();
        executor.expect_execute().returning(|_, _| {
            Ok(CommandResult {
                exit_code: 0,
                stdout: "partial".to_string(),
                stderr: String::new(),
                truncated: true,
            })
        });

        let params = RunParams::parse(json!({ "command": "cat big.log" })).unwrap();
        let response = tools::ssh_run(params, &resolver(), &executor).await;
        assert_eq!(parse_text(response.first_text())["truncated"], true);
    }

    #[test]
    fn test_run_params_reject_empty_and_missing_command() {
        assert!(matches!(
            RunParams::parse(json!({ "command": "" })),
            Err(SshMcpError::Validation(_))
        ));
        assert!(matches!(
            RunParams::parse(json!({})),
            Err(SshMcpError::Validation(_))
        ));
        assert!(matches!(
            RunParams::parse(json!({ "command": 42 })),
            Err(SshMcpError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_call_tool_rejects_empty_command_before_connecting() {
        let mut executor = MockRemoteExecutor::new();
        executor.expect_execute().times(0);

        let params = ToolCallParams {
            name: tools::RUN_TOOL.to_string(),
            arguments: json!({ "command": "" }),
        };
        let result = call_tool(params, &resolver(), &executor).await;
        assert!(matches!(result, Err(SshMcpError::Validation(_))));
    }

    #[tokio::test]
    async fn test_call_tool_unknown_tool() {
        let executor = MockRemoteExecutor::new();
        let params = ToolCallParams {
            name: "ssh_upload".to_string(),
            arguments: json!({}),
        };
        let result = call_tool(params, &resolver(), &executor).await;
        assert!(matches!(result, Err(SshMcpError::McpProtocol(_))));
    }

    #[tokio::test]
    async fn test_probe_twice_is_independent() {
        let mut executor = MockRemoteExecutor::new();
        let mut seq = mockall::Sequence::new();
        executor
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(SshMcpError::Timeout("Timed out while waiting for handshake".into())));
        executor
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(output(0, "web-01", "")));

        let first = tools::ssh_test_connection(&resolver(), &executor).await;
        let second = tools::ssh_test_connection(&resolver(), &executor).await;

        assert!(first.is_error());
        assert!(!second.is_error());
        assert_eq!(parse_text(second.first_text())["stdout"], "web-01");
    }

    #[test]
    fn test_static_resolver_is_a_config_resolver() {
        let resolver: &dyn ConfigResolver = &resolver();
        assert_eq!(resolver.resolve().unwrap().port, 22);
    }
}
