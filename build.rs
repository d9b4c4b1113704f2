use std::io::Result;

fn main() -> Result<()> {
    // Only the client stubs are needed; the ingest core never serves these
    // RPCs, it only dials the agent-local sensor/observer sockets.
    tonic_build::configure()
        .build_server(false)
        .type_attribute(".", "#[allow(clippy::large_enum_variant)]")
        .compile_protos(
            &["proto/sensor.proto", "proto/observer.proto"],
            &["proto/"],
        )?;

    println!("cargo:rerun-if-changed=proto/sensor.proto");
    println!("cargo:rerun-if-changed=proto/observer.proto");

    Ok(())
}
