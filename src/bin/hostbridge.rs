use hostbridge::ffi::launch_process;

fn main() {
    let args = std::env::args_os().map(|arg| arg.into_encoded_bytes());

    match launch_process(args) {
        Ok(status) => std::process::exit(status.code()),
        Err(e) => hostbridge::fatal(&e),
    }
}
