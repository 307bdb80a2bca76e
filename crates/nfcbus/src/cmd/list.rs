use crate::cmd::ListArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_ports, OutputFormat};

pub fn run(args: ListArgs, format: OutputFormat) -> CliResult<i32> {
    let naming = args.naming.naming();
    let ports = naming.scan();
    tracing::debug!(dir = ?naming.device_dir(), found = ports.len(), "listed bus devices");
    print_ports(naming.device_dir(), &ports, format);
    Ok(SUCCESS)
}
