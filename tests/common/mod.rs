#![allow(dead_code)]

pub mod fixtures {
    use brrtserve::config::ProjectConfig;
    use brrtserve::resources::ProjectGraph;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    pub const PROJECT_YAML: &str = r#"
project:
  name: my.app
  version: 1.0.0
  type: application
dependencies:
  - name: my.lib
    version: 2.0.0
    type: library
    namespace: my/lib
"#;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// An application with one library dependency on disk.
    ///
    /// The returned directory must outlive anything built from the config.
    pub fn project() -> (TempDir, ProjectConfig) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "ui5.yaml", PROJECT_YAML);
        write(root, "webapp/index.html", "<html><body>hello</body></html>");
        write(root, "webapp/Component.js", "sap.ui.define([], function() {});");
        write(
            root,
            "src/my/lib/.library",
            "<library><name>my.lib</name></library>",
        );
        write(
            root,
            "src/my/lib/themes/base/library.source.less",
            "@textColor: #32363a;\n.sapText { color: @textColor; float: left; }\n",
        );
        write(root, "test/my/lib/qunit/test.html", "<html>test</html>");
        let config = ProjectConfig::load(&root.join("ui5.yaml")).unwrap();
        (dir, config)
    }

    pub fn graph(config: &ProjectConfig) -> ProjectGraph {
        config.to_graph().unwrap()
    }
}

pub mod test_server {
    use brrtserve::extension::ExtensionRegistry;
    use brrtserve::server::{build_pipeline, serve, ServerHandle, ServerOptions};
    use brrtserve::theme::SourceThemeCompiler;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::sync::{Arc, Once};
    use std::time::Duration;

    /// Ensures May coroutines are configured only once
    static MAY_INIT: Once = Once::new();

    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_stack_size(0x10000);
        });
    }

    /// Serve the fixture project on a free local port.
    pub fn start(mut options: ServerOptions) -> (tempfile::TempDir, ServerHandle, SocketAddr) {
        setup_may_runtime();
        let (dir, config) = super::fixtures::project();
        let pipeline = build_pipeline(
            super::fixtures::graph(&config),
            Arc::new(SourceThemeCompiler::new()),
            &options,
            config.custom_middleware(),
            &ExtensionRegistry::new(),
        )
        .unwrap();
        options.port = free_port();
        options.change_port_if_in_use = true;
        let handle = serve(pipeline, &options).unwrap();
        handle.wait_ready().unwrap();
        let addr = handle.addr();
        (dir, handle, addr)
    }

    fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    pub fn send_request(addr: &SocketAddr, req: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(req.as_bytes()).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(200)))
            .unwrap();
        let mut buf = Vec::new();
        loop {
            let mut tmp = [0u8; 4096];
            match stream.read(&mut tmp) {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break
                }
                Err(e) => panic!("read error: {e:?}"),
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    pub struct ParsedResponse {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: String,
    }

    impl ParsedResponse {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }
    }

    pub fn parse_response(resp: &str) -> ParsedResponse {
        let (head, body) = resp.split_once("\r\n\r\n").unwrap_or((resp, ""));
        let mut status = 0;
        let mut headers = Vec::new();
        for line in head.lines() {
            if line.starts_with("HTTP/1.1") {
                status = line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("0")
                    .parse()
                    .unwrap();
            } else if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
        }
        ParsedResponse {
            status,
            headers,
            body: body.to_string(),
        }
    }

    /// `GET` with optional extra header lines, each ending in `\r\n`.
    pub fn get(addr: &SocketAddr, path: &str, extra_headers: &str) -> ParsedResponse {
        let req = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n{extra_headers}\r\n");
        parse_response(&send_request(addr, &req))
    }
}
