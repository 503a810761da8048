use chrono::{DateTime, Utc};
use http::Method;
use minijinja::Environment;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::repository::MiddlewareContext;
use super::{Flow, Middleware};
use crate::error::ServeError;
use crate::resources::{GlobOptions, Resource, ResourceReader};
use crate::server::{DevRequest, DevResponse};

const TEMPLATE_NAME: &str = "index.html";
const TEMPLATE: &str = include_str!("../../templates/index.html.j2");

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct IndexOptions {
    simple_index: bool,
    show_hidden: bool,
}

#[derive(Debug, Serialize)]
struct IndexEntry {
    name: String,
    href: String,
    is_dir: bool,
    size: u64,
    modified: String,
}

/// HTML listing of directories no earlier middleware served.
pub struct ServeIndexMiddleware {
    all: Arc<dyn ResourceReader>,
    env: Environment<'static>,
    simple: bool,
    show_hidden: bool,
}

pub fn create(ctx: &MiddlewareContext, options: &Value) -> Result<Arc<dyn Middleware>, String> {
    let options: IndexOptions = if options.is_null() {
        IndexOptions::default()
    } else {
        serde_json::from_value(options.clone()).map_err(|e| format!("invalid index options: {e}"))?
    };
    let mut env = Environment::new();
    env.add_template(TEMPLATE_NAME, TEMPLATE)
        .map_err(|e| format!("invalid index template: {e}"))?;
    Ok(Arc::new(ServeIndexMiddleware {
        all: Arc::clone(&ctx.resources.all),
        env,
        simple: options.simple_index,
        show_hidden: options.show_hidden,
    }))
}

fn entry(dir_href: &str, resource: &Resource) -> IndexEntry {
    let modified: DateTime<Utc> = resource.stat().modified.into();
    IndexEntry {
        name: resource.name().to_string(),
        href: format!("{dir_href}{}", resource.name()),
        is_dir: resource.is_directory(),
        size: resource.stat().size,
        modified: modified.format("%Y-%m-%d %H:%M").to_string(),
    }
}

fn with_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

impl ServeIndexMiddleware {
    fn render(&self, directory: &str, entries: &[IndexEntry]) -> Result<String, ServeError> {
        let parent = (directory != "/").then(|| {
            let trimmed = directory.trim_end_matches('/');
            match trimmed.rsplit_once('/') {
                Some((parent, _)) => format!("{parent}/"),
                None => "/".to_string(),
            }
        });
        let template = self
            .env
            .get_template(TEMPLATE_NAME)
            .map_err(|e| ServeError::Render(e.to_string()))?;
        template
            .render(minijinja::context! {
                directory => directory,
                parent => parent,
                entries => entries,
                simple => self.simple,
            })
            .map_err(|e| ServeError::Render(e.to_string()))
    }
}

impl Middleware for ServeIndexMiddleware {
    fn handle(&self, req: &DevRequest, res: &mut DevResponse) -> Result<Flow, ServeError> {
        if req.method != Method::GET && req.method != Method::HEAD {
            return Ok(Flow::Next);
        }
        let found = self
            .all
            .by_path(&req.path)
            .map_err(|source| ServeError::Resource {
                path: req.path.clone(),
                source,
            })?;
        if !found.is_some_and(|r| r.is_directory()) {
            return Ok(Flow::Next);
        }

        let dir = with_slash(&req.path);
        let pattern = format!("{}*", globset::escape(&dir));
        let resources = self
            .all
            .by_glob(
                &pattern,
                GlobOptions {
                    include_directories: true,
                },
            )
            .map_err(|source| ServeError::Resource {
                path: pattern.clone(),
                source,
            })?;

        let href_base = with_slash(&req.original_path);
        let mut entries: Vec<IndexEntry> = resources
            .iter()
            .filter(|r| self.show_hidden || !r.name().starts_with('.'))
            .map(|r| entry(&href_base, r))
            .collect();
        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

        let html = self.render(&href_base, &entries)?;
        res.send(200, "text/html; charset=UTF-8", html);
        Ok(Flow::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{FsReader, MiddlewareResources};
    use serde_json::json;
    use std::fs;

    fn middleware(dir: &tempfile::TempDir, options: Value) -> Arc<dyn Middleware> {
        let mut ctx = MiddlewareContext::for_tests();
        ctx.resources = MiddlewareResources::single(Arc::new(FsReader::new("/", dir.path())));
        create(&ctx, &options).unwrap()
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("webapp/controller")).unwrap();
        fs::write(dir.path().join("webapp/index.html"), "<html/>").unwrap();
        fs::write(dir.path().join("webapp/.hidden"), "").unwrap();
        dir
    }

    fn body(res: &DevResponse) -> &str {
        std::str::from_utf8(res.body()).unwrap()
    }

    #[test]
    fn test_lists_directory_dirs_first() {
        let dir = fixture();
        let mw = middleware(&dir, json!({"showHidden": false}));
        let mut res = DevResponse::new();
        let flow = mw
            .handle(&DevRequest::new(Method::GET, "/webapp"), &mut res)
            .unwrap();
        assert_eq!(flow, Flow::Done);
        let html = body(&res);
        assert!(html.contains("Index of "));
        assert!(html.contains("index.html"));
        assert!(!html.contains(".hidden"));
        let controller = html.find("controller").unwrap();
        let index = html.find("index.html").unwrap();
        assert!(controller < index);
    }

    #[test]
    fn test_hidden_and_simple() {
        let dir = fixture();
        let mw = middleware(&dir, json!({"simpleIndex": true, "showHidden": true}));
        let mut res = DevResponse::new();
        mw.handle(&DevRequest::new(Method::GET, "/webapp/"), &mut res)
            .unwrap();
        let html = body(&res);
        assert!(html.contains(".hidden"));
        assert!(html.contains("<ul>"));
        assert!(!html.contains("<table>"));
    }

    #[test]
    fn test_files_and_missing_delegate() {
        let dir = fixture();
        let mw = middleware(&dir, Value::Null);
        let mut res = DevResponse::new();
        for path in ["/webapp/index.html", "/nope"] {
            assert_eq!(
                mw.handle(&DevRequest::new(Method::GET, path), &mut res).unwrap(),
                Flow::Next
            );
        }
    }
}
