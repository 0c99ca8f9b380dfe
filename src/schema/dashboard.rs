//! Built-in schema for the operations dashboard settings surface

use settings_path::PathAddress;

use super::{GroupSchema, Rule, Schema, SchemaNode};
use crate::document::Value;

/// Schema identifier
pub const SCHEMA_ID: &str = "dashboard/settings@1";

/// Schema version
pub const SCHEMA_VERSION: u32 = 1;

/// The dashboard settings schema.
pub fn dashboard() -> Schema {
    let runtime = GroupSchema::new()
        .leaf("apiPort", 8080)
        .leaf("wsPort", 8081)
        .leaf("dataDir", "./data")
        .leaf("logLevel", "info")
        .leaf("tlsEnabled", false)
        .leaf("tlsCertPath", "");

    let governance = GroupSchema::new()
        .leaf("allowShell", false)
        .leaf("allowInternet", false)
        .leaf("requireApproval", true)
        .leaf("blockedCommands", Value::string_array(["rm -rf /", "shutdown"]));

    let llm = GroupSchema::new()
        .leaf("provider_mode", "local")
        .leaf("temperature", 0.7)
        .leaf("maxTokens", 4096)
        .group(
            "local",
            GroupSchema::new()
                .leaf("endpoint", "http://127.0.0.1:11434")
                .leaf("model", "llama3"),
        )
        .group(
            "openai",
            GroupSchema::new().leaf("apiKey", "").leaf("model", "gpt-4o"),
        )
        .group(
            "anthropic",
            GroupSchema::new()
                .leaf("apiKey", "")
                .leaf("model", "claude-sonnet"),
        );

    let account = GroupSchema::new()
        .leaf("label", "Primary")
        .leaf("imapHost", "imap.example.com")
        .leaf("imapPort", 993)
        .leaf("username", "")
        .leaf("useTls", true)
        .leaf("folders", Value::string_array(["INBOX"]));

    let email = GroupSchema::new()
        .leaf("enabled", false)
        .leaf("pollIntervalSecs", 300)
        .list("accounts", SchemaNode::Group(account), 1);

    let ui = GroupSchema::new()
        .leaf("theme", "dark")
        .leaf("density", "comfortable")
        .leaf("refreshIntervalSecs", 5)
        .leaf("pinnedPanels", Value::string_array(["jobs", "telemetry"]));

    let root = GroupSchema::new()
        .group(
            "system",
            GroupSchema::new()
                .group("runtime", runtime)
                .group("governance", governance),
        )
        .group("llm", llm)
        .group("email", email)
        .group("ui", ui);

    let runtime_path = PathAddress::field("system").child("runtime");
    let tls_enabled = runtime_path.child("tlsEnabled");
    let tls_cert_path = runtime_path.child("tlsCertPath");

    Schema::new(SCHEMA_ID, SCHEMA_VERSION, root)
        .restart_on("system.runtime.apiPort")
        .restart_on("system.runtime.wsPort")
        .restart_on("system.runtime.dataDir")
        .restart_on("system.runtime.tlsEnabled")
        .restart_on("system.runtime.tlsCertPath")
        .rule(Rule::range("system.runtime.apiPort", 1.0, 65535.0))
        .rule(Rule::range("system.runtime.wsPort", 1.0, 65535.0))
        .rule(Rule::one_of(
            "system.runtime.logLevel",
            &["error", "warn", "info", "debug", "trace"],
        ))
        .rule(Rule::required_when(tls_cert_path, tls_enabled, true))
        .rule(Rule::one_of(
            "llm.provider_mode",
            &["local", "openai", "anthropic"],
        ))
        .rule(Rule::range("llm.temperature", 0.0, 2.0))
        .rule(Rule::range("llm.maxTokens", 1.0, 200_000.0))
        .rule(Rule::range("email.pollIntervalSecs", 30.0, 86_400.0))
        .rule(Rule::non_empty("email.accounts[].imapHost"))
        .rule(Rule::range("email.accounts[].imapPort", 1.0, 65535.0))
        .rule(Rule::one_of("ui.theme", &["dark", "light", "system"]))
        .rule(Rule::one_of("ui.density", &["compact", "comfortable"]))
        .rule(Rule::range("ui.refreshIntervalSecs", 1.0, 3600.0))
}
