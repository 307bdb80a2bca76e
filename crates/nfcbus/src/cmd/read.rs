use nfcbus_i2c::{BusHandle, OpenConfig};

use crate::cmd::{ctrlc_token, parse_timeout, ReadArgs};
use crate::exit::{bus_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_transfer, OutputFormat};

pub fn run(args: ReadArgs, format: OutputFormat) -> CliResult<i32> {
    if args.length == 0 {
        return Err(CliError::new(USAGE, "frame length must be greater than zero"));
    }
    let timeout = parse_timeout(&args.timeout)?;
    let cancel = ctrlc_token()?;

    let config = OpenConfig {
        force: args.bus.force,
    };
    let mut handle = BusHandle::open_with(&args.bus.bus, args.bus.address, &config)
        .map_err(|err| bus_error("open failed", err))?;

    let frame = handle
        .read_frame(args.length, Some(&cancel), timeout)
        .map_err(|err| bus_error("read failed", err))?;
    handle.close();

    print_transfer(&args.bus.bus, args.bus.address, "read", &frame, format);
    Ok(SUCCESS)
}
