//! Server configuration and fixed responses

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, loaded from the environment
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    pub ssl_port: u16,
    pub use_fs: bool,
    pub static_root: PathBuf,
    pub manifest_url: Option<String>,
    pub refresh_interval: Duration,
    pub tls_key: PathBuf,
    pub tls_cert: PathBuf,
}

/// Fixed landing page served for the root path
pub const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>Homestead</title>
</head>

<body>
Simple home page.
<a href="static/html/index.html">Click here for more.</a>
</body>

</html>"#;
