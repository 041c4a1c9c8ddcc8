//! Runs catalog operations through the gateway.
//!
//! Every remote command goes through [`Gateway::execute_request`], so each
//! step is policy-checked and audited like a direct `execute` call.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};

use super::catalog::{Operation, BROADCAST_PAN_ID};
use super::parse;
use crate::execution::CommandRequest;
use crate::gateway::{Gateway, Outcome};

/// Wait after `thread start` before reading back credentials.
pub const THREAD_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Deadline for opkg commands that hit the network or the flash.
pub const PACKAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// Cap on packages returned by `opkg_list_available`.
pub const AVAILABLE_PACKAGE_LIMIT: usize = 500;

const OT_CTL: &str = "/usr/sbin/ot-ctl";

const DHCP_LEASE_FILES: &[&str] = &["cat /tmp/dhcp.leases", "cat /var/dhcp.leases"];

const SYSTEM_INFO: &[(&str, &str)] = &[
    ("board", "ubus call system board"),
    ("info", "ubus call system info"),
    ("uptime", "cat /proc/uptime"),
    ("loadavg", "cat /proc/loadavg"),
];

const THREAD_INFO: &[(&str, &str)] = &[
    ("state", "state"),
    ("channel", "channel"),
    ("panid", "panid"),
    ("networkname", "networkname"),
    ("extpanid", "extpanid"),
    ("ipaddr", "ipaddr"),
    ("rloc16", "rloc16"),
    ("leaderdata", "leaderdata"),
    ("neighbor_table", "neighbor table"),
    ("child_table", "child table"),
];

fn ot_ctl(args: &str) -> String {
    format!("{} {}", OT_CTL, args)
}

/// Result of one operation: a success flag plus operation-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationReport {
    pub operation: &'static str,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl OperationReport {
    fn ok(operation: &'static str) -> Self {
        Self {
            operation,
            success: true,
            error: None,
            data: Map::new(),
        }
    }

    fn failed(operation: &'static str, error: impl Into<String>) -> Self {
        Self {
            operation,
            success: false,
            error: Some(error.into()),
            data: Map::new(),
        }
    }

    fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.data.insert(key.to_string(), value);
        self
    }

    /// Field lookup for callers and tests.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// Runs [`Operation`]s against one gateway.
pub struct OperationRunner<'a> {
    gateway: &'a Gateway,
    settle_delay: Duration,
}

impl<'a> OperationRunner<'a> {
    pub fn new(gateway: &'a Gateway) -> Self {
        Self {
            gateway,
            settle_delay: THREAD_SETTLE_DELAY,
        }
    }

    /// Override the post-start wait of `thread_create_network`.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub async fn run(&self, operation: &Operation) -> OperationReport {
        let name = operation.name();
        tracing::info!(operation = name, "running operation");

        let report = match operation {
            Operation::TestConnection => {
                let test = self.gateway.test_connection().await;
                let mut report = OperationReport::ok(name).with("message", &test.message);
                report.success = test.connected;
                report.error = test.error;
                match test.router_response {
                    Some(response) => report.with("router_response", response),
                    None => report,
                }
            }
            Operation::ExecuteCommand {
                command,
                timeout_secs,
            } => {
                let mut request = CommandRequest::new(command.as_str());
                if let Some(secs) = timeout_secs {
                    request = request.timeout(Duration::from_secs(*secs));
                }
                let response = self.gateway.execute_request(request).await.to_response();
                let mut report = OperationReport::ok(name)
                    .with("output", response.output.unwrap_or_default())
                    .with("exit_code", response.exit_code)
                    .with("execution_time", response.execution_time);
                report.success = response.success;
                if !response.success {
                    report.error = Some(response.error);
                }
                report
            }
            Operation::GetSystemInfo => self.system_info(name).await,
            Operation::RestartInterface { interface } => {
                let command = format!("ubus call network.interface.{} restart", interface);
                let outcome = self.step(&command, None).await;
                match outcome.error() {
                    None => OperationReport::ok(name)
                        .with(
                            "message",
                            format!("Interface '{}' restarted successfully", interface),
                        )
                        .with("output", outcome.stdout()),
                    Some(error) => OperationReport::failed(
                        name,
                        format!("Failed to restart interface '{}': {}", interface, error),
                    ),
                }
            }
            Operation::GetWifiStatus => {
                let outcome = self.step("ubus call network.wireless status", None).await;
                match outcome.error() {
                    None => OperationReport::ok(name)
                        .with("wifi_status", parse::json_or_text(outcome.stdout().unwrap_or(""))),
                    Some(error) => OperationReport::failed(name, error),
                }
            }
            Operation::ListDhcpLeases => self.dhcp_leases(name).await,
            Operation::GetFirewallRules => {
                let outcome = self.step("iptables -L -n -v", None).await;
                match outcome.error() {
                    None => OperationReport::ok(name).with("rules", outcome.stdout()),
                    Some(error) => OperationReport::failed(name, error),
                }
            }
            Operation::ReadConfig { config_name } => {
                let outcome = self.step(&format!("uci show {}", config_name), None).await;
                match outcome.error() {
                    None => OperationReport::ok(name)
                        .with("config_name", config_name)
                        .with("config", outcome.stdout()),
                    Some(error) => OperationReport::failed(name, error),
                }
            }
            Operation::ThreadGetState => {
                let outcome = self.step(&ot_ctl("state"), None).await;
                match outcome.error() {
                    None => OperationReport::ok(name)
                        .with("state", outcome.stdout().unwrap_or("").trim()),
                    Some(error) => OperationReport::failed(name, error),
                }
            }
            Operation::ThreadCreateNetwork {
                network_name,
                channel,
                panid,
            } => {
                let panid =
                    panid.unwrap_or_else(|| rand::thread_rng().gen_range(0..BROADCAST_PAN_ID));
                self.create_thread_network(name, network_name, *channel, panid)
                    .await
            }
            Operation::ThreadGetDataset => {
                let outcome = self.step(&ot_ctl("dataset active"), None).await;
                match outcome.error() {
                    None => {
                        let hex = self.step(&ot_ctl("dataset active -x"), None).await;
                        let dataset_hex = match hex {
                            Outcome::Succeeded { ref stdout, .. } => Some(stdout.trim()),
                            _ => None,
                        };
                        OperationReport::ok(name)
                            .with("dataset", outcome.stdout())
                            .with("dataset_hex", dataset_hex)
                    }
                    Some(error) => OperationReport::failed(name, error),
                }
            }
            Operation::ThreadGetInfo => {
                let mut info = Map::new();
                for (key, args) in THREAD_INFO {
                    let outcome = self.step(&ot_ctl(args), None).await;
                    let value = match outcome {
                        Outcome::Succeeded { stdout, .. } => {
                            Value::String(stdout.trim().to_string())
                        }
                        _ => Value::Null,
                    };
                    info.insert(key.to_string(), value);
                }
                OperationReport::ok(name).with("thread_info", info)
            }
            Operation::ThreadEnableCommissioner { passphrase } => {
                self.enable_commissioner(name, passphrase).await
            }
            Operation::OpkgUpdate => {
                let outcome = self.step("opkg update", Some(PACKAGE_TIMEOUT)).await;
                match outcome.error() {
                    None => OperationReport::ok(name)
                        .with("message", "Package lists updated successfully")
                        .with("output", outcome.stdout()),
                    Some(error) => OperationReport::failed(
                        name,
                        format!("Failed to update package lists: {}", error),
                    ),
                }
            }
            Operation::OpkgInstall { package_name } => {
                self.package_change(name, "install", "installed", package_name)
                    .await
            }
            Operation::OpkgRemove { package_name } => {
                self.package_change(name, "remove", "removed", package_name)
                    .await
            }
            Operation::OpkgListInstalled => {
                let outcome = self.step("opkg list-installed", None).await;
                match outcome.error() {
                    None => {
                        let packages = parse::packages(outcome.stdout().unwrap_or(""));
                        OperationReport::ok(name)
                            .with("count", packages.len())
                            .with("packages", packages)
                    }
                    Some(error) => OperationReport::failed(name, error),
                }
            }
            Operation::OpkgInfo { package_name } => {
                let outcome = self.step(&format!("opkg info {}", package_name), None).await;
                match outcome.error() {
                    None => OperationReport::ok(name).with(
                        "package_info",
                        parse::package_info(outcome.stdout().unwrap_or("")),
                    ),
                    Some(error) => {
                        OperationReport::failed(name, error).with("output", outcome.stdout())
                    }
                }
            }
            Operation::OpkgListAvailable => self.available_packages(name).await,
        };

        if !report.success {
            tracing::warn!(operation = name, error = ?report.error, "operation failed");
        }
        report
    }

    async fn step(&self, command: &str, timeout: Option<Duration>) -> Outcome {
        let request = CommandRequest::new(command);
        let request = match timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        };
        self.gateway.execute_request(request).await
    }

    async fn system_info(&self, name: &'static str) -> OperationReport {
        let mut info = Map::new();
        let mut first_error = None;
        let mut any_succeeded = false;

        for (key, command) in SYSTEM_INFO {
            let outcome = self.step(command, None).await;
            let value = match (&outcome, outcome.error()) {
                (Outcome::Succeeded { stdout, .. }, _) => {
                    any_succeeded = true;
                    if matches!(*key, "board" | "info") {
                        parse::json_or_text(stdout)
                    } else {
                        Value::String(stdout.clone())
                    }
                }
                (_, error) => {
                    let error = error.unwrap_or_default();
                    first_error.get_or_insert_with(|| error.clone());
                    serde_json::json!({ "error": error })
                }
            };
            info.insert(key.to_string(), value);
        }

        if any_succeeded {
            OperationReport::ok(name).with("system_info", info)
        } else {
            OperationReport::failed(name, first_error.unwrap_or_default())
        }
    }

    async fn dhcp_leases(&self, name: &'static str) -> OperationReport {
        for command in DHCP_LEASE_FILES {
            if let Outcome::Succeeded { stdout, .. } = self.step(command, None).await {
                if stdout.is_empty() {
                    continue;
                }
                let leases = parse::dhcp_leases(&stdout);
                return OperationReport::ok(name)
                    .with("count", leases.len())
                    .with("leases", leases);
            }
        }
        OperationReport::failed(name, "Could not read DHCP leases file")
    }

    async fn create_thread_network(
        &self,
        name: &'static str,
        network_name: &str,
        channel: u8,
        panid: u16,
    ) -> OperationReport {
        let panid = format!("0x{:04x}", panid);

        if let Some(error) = self.step(&ot_ctl("dataset init new"), None).await.error() {
            return OperationReport::failed(name, format!("Failed to initialize dataset: {}", error));
        }

        for args in [
            format!("channel {}", channel),
            format!("panid {}", panid),
            format!("networkname {}", network_name),
        ] {
            let command = ot_ctl(&args);
            if let Some(error) = self.step(&command, None).await.error() {
                return OperationReport::failed(
                    name,
                    format!("Failed to execute '{}': {}", command, error),
                );
            }
        }

        for (args, what) in [
            ("dataset commit active", "commit dataset"),
            ("ifconfig up", "bring up interface"),
            ("thread start", "start Thread"),
        ] {
            if let Some(error) = self.step(&ot_ctl(args), None).await.error() {
                return OperationReport::failed(name, format!("Failed to {}: {}", what, error));
            }
        }

        tokio::time::sleep(self.settle_delay).await;

        let mut credentials = Map::new();
        for (key, args) in [
            ("network_key", "networkkey"),
            ("ext_panid", "extpanid"),
            ("dataset_hex", "dataset active -x"),
            ("state", "state"),
        ] {
            if let Outcome::Succeeded { stdout, .. } = self.step(&ot_ctl(args), None).await {
                credentials.insert(key.to_string(), Value::String(stdout.trim().to_string()));
            }
        }

        OperationReport::ok(name)
            .with(
                "message",
                format!("Thread network '{}' created successfully", network_name),
            )
            .with("network_name", network_name)
            .with("channel", channel)
            .with("panid", panid)
            .with("credentials", credentials)
    }

    async fn enable_commissioner(&self, name: &'static str, passphrase: &str) -> OperationReport {
        if let Some(error) = self.step(&ot_ctl("commissioner start"), None).await.error() {
            return OperationReport::failed(name, format!("Failed to start commissioner: {}", error));
        }
        let joiner = ot_ctl(&format!("commissioner joiner add * {}", passphrase));
        if let Some(error) = self.step(&joiner, None).await.error() {
            return OperationReport::failed(name, format!("Failed to add joiner: {}", error));
        }

        OperationReport::ok(name)
            .with("message", "Thread Commissioner enabled")
            .with("passphrase", passphrase)
            .with("note", "Devices can now join using this passphrase")
    }

    async fn package_change(
        &self,
        name: &'static str,
        verb: &str,
        past: &str,
        package: &str,
    ) -> OperationReport {
        let command = format!("opkg {} {}", verb, package);
        let outcome = self.step(&command, Some(PACKAGE_TIMEOUT)).await;
        match outcome.error() {
            None => OperationReport::ok(name)
                .with("message", format!("Package '{}' {} successfully", package, past))
                .with("output", outcome.stdout()),
            Some(error) => OperationReport::failed(
                name,
                format!("Failed to {} package '{}': {}", verb, package, error),
            )
            .with("output", outcome.stdout().unwrap_or("")),
        }
    }

    async fn available_packages(&self, name: &'static str) -> OperationReport {
        let outcome = self.step("opkg list", None).await;
        if let Some(error) = outcome.error() {
            return OperationReport::failed(name, error);
        }

        let text = outcome.stdout().unwrap_or("");
        let total = text.lines().count();
        let packages: Vec<_> = text
            .lines()
            .take(AVAILABLE_PACKAGE_LIMIT)
            .filter_map(parse::package_line)
            .collect();
        let truncated = total > AVAILABLE_PACKAGE_LIMIT;

        let report = OperationReport::ok(name)
            .with("count", packages.len())
            .with("packages", packages)
            .with("truncated", truncated)
            .with("total_available", total);
        if truncated {
            report.with(
                "note",
                format!(
                    "List limited to {} packages. Use opkg_info for a specific package.",
                    AVAILABLE_PACKAGE_LIMIT
                ),
            )
        } else {
            report
        }
    }
}
