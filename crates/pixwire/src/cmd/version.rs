use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("pixwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: pixwire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "wire: u16-le metadata length, json metadata, content-type {}",
        pixwire_frame::CONTENT_TYPE_IMAGE
    );
    println!(
        "max_message_size_default: {}",
        pixwire_frame::DEFAULT_MAX_MESSAGE_SIZE
    );

    Ok(SUCCESS)
}
