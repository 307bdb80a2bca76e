use nfcbus_i2c::{CancelToken, PortNaming};
use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Warn,
    Info,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: &'static str,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let naming = args.naming.naming();
    let checks = vec![
        platform_check(&naming),
        device_dir_check(&naming),
        bus_devices_check(&naming),
        cancellation_check(),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let output = DoctorOutput {
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };

    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn platform_check(naming: &PortNaming) -> CheckResult {
    if naming.prefixes().is_empty() {
        return CheckResult {
            name: "platform_naming",
            status: CheckStatus::Fail,
            detail: format!(
                "no bus device naming known for {}; pass --prefix",
                std::env::consts::OS
            ),
        };
    }
    let prefixes = naming
        .prefixes()
        .iter()
        .map(|p| format!("{}* ({})", p.prefix, p.meaning))
        .collect::<Vec<_>>()
        .join(", ");
    CheckResult {
        name: "platform_naming",
        status: CheckStatus::Pass,
        detail: prefixes,
    }
}

fn device_dir_check(naming: &PortNaming) -> CheckResult {
    let dir = naming.device_dir();
    match std::fs::read_dir(dir) {
        Ok(_) => CheckResult {
            name: "device_dir",
            status: CheckStatus::Pass,
            detail: format!("{} readable", dir.display()),
        },
        Err(err) => CheckResult {
            name: "device_dir",
            status: CheckStatus::Fail,
            detail: format!("{} unreadable: {err}", dir.display()),
        },
    }
}

fn bus_devices_check(naming: &PortNaming) -> CheckResult {
    let ports = naming.list_ports();
    if ports.is_empty() {
        // Bus adapters can be absent until the i2c-dev module is loaded.
        return CheckResult {
            name: "bus_devices",
            status: CheckStatus::Warn,
            detail: "no bus device files found (is i2c-dev loaded?)".to_string(),
        };
    }
    CheckResult {
        name: "bus_devices",
        status: CheckStatus::Pass,
        detail: ports
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn cancellation_check() -> CheckResult {
    match CancelToken::new() {
        Ok(_) => CheckResult {
            name: "cancellation",
            status: CheckStatus::Info,
            detail: "self-pipe cancellation available".to_string(),
        },
        Err(err) => CheckResult {
            name: "cancellation",
            status: CheckStatus::Fail,
            detail: format!("cannot create cancellation pipe: {err}"),
        },
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("nfcbus doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<16} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Warn => "WARN",
        CheckStatus::Info => "INFO",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_device_dir_fails() {
        let naming = PortNaming::linux().with_device_dir("/nonexistent/nfcbus/dev");
        let check = device_dir_check(&naming);
        assert!(matches!(check.status, CheckStatus::Fail));
        let check = bus_devices_check(&naming);
        assert!(matches!(check.status, CheckStatus::Warn));
    }

    #[test]
    fn unknown_platform_fails() {
        let check = platform_check(&PortNaming::for_os("plan9"));
        assert!(matches!(check.status, CheckStatus::Fail));
    }

    #[test]
    fn doctor_output_has_overall_status() {
        let output = DoctorOutput {
            checks: vec![CheckResult {
                name: "x",
                status: CheckStatus::Pass,
                detail: "ok".to_string(),
            }],
            overall: "pass",
        };
        let json = serde_json::to_string(&output).expect("doctor output should serialize");
        assert!(json.contains("\"overall\":\"pass\""));
    }
}
