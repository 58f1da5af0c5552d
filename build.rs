// SocketCAN, the socket options and the record layout are Linux-only.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    match std::env::var("CARGO_CFG_TARGET_OS") {
        Ok(os) if os == "linux" => Ok(()),
        Ok(os) => Err(format!("canfd needs Linux SocketCAN; cannot build for '{}'", os).into()),
        Err(_) => Err("canfd: target OS unknown, Linux SocketCAN required".into()),
    }
}
