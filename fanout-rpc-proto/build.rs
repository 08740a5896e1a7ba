fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/topology.proto");
    println!("cargo:rerun-if-changed=proto/nameserver2.proto");

    // 不依赖系统安装的 protoc
    std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

    tonic_build::configure()
        // 服务端只在测试里用来起本地 mds
        .build_server(true)
        .build_client(true)
        .compile(
            &["proto/topology.proto", "proto/nameserver2.proto"],
            &["proto"],
        )?;

    Ok(())
}
