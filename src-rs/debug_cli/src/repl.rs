use std::io;
use std::thread;
use std::time::Duration;

use crate::client::HTTPClient;
use crate::models::{CLIConfig, StartRequest};
use crate::render;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct REPL {
    pub config: CLIConfig,
    pub client: HTTPClient,
}

impl REPL {
    pub fn new(config: CLIConfig, client: HTTPClient) -> Self {
        Self { config, client }
    }

    pub fn run(&mut self) {
        render::banner(&self.config);
        loop {
            render::prompt(&self.config);
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('/') {
                if self.handle_command(&line) {
                    break;
                }
                continue;
            }
            self.start(&line);
        }
    }

    fn handle_command(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("").trim_start_matches('/');
        let rest = parts.next().unwrap_or("").trim();
        match cmd {
            "exit" | "quit" => return true,
            "help" => render::help(),
            "module" => {
                if rest.is_empty() {
                    render::info(&format!("module: {}", self.config.module));
                } else {
                    self.config.module = rest.to_lowercase();
                    self.config.current_task = None;
                    self.reattach();
                }
            }
            "units" => {
                if rest.is_empty() {
                    render::info(&format!("units: {}", self.config.units));
                } else if let Ok(val) = rest.parse::<usize>() {
                    self.config.units = val.clamp(1, 4);
                    render::info(&format!("units: {}", self.config.units));
                } else {
                    render::error("invalid unit count");
                }
            }
            "content" => {
                if rest.is_empty() {
                    render::info(&format!("content: {:?}", self.config.content));
                } else {
                    self.config.content = Some(rest.to_lowercase());
                    render::info("content updated");
                }
            }
            "status" => {
                if let Some(id) = self.task_arg(rest) {
                    match self.client.status(&self.config.module, &id) {
                        Ok(snap) => render::task(&snap),
                        Err(err) => render::error(&err),
                    }
                }
            }
            "wait" => {
                if let Some(id) = self.task_arg(rest) {
                    self.wait(&id);
                }
            }
            "close" => {
                if let Some(id) = self.task_arg(rest) {
                    match self.client.close(&self.config.module, &id) {
                        Ok(true) => render::info("task moved to background"),
                        Ok(false) => render::info("task was not running in the foreground"),
                        Err(err) => render::error(&err),
                    }
                }
            }
            "cancel" => {
                if let Some(id) = self.task_arg(rest) {
                    match self.client.cancel(&self.config.module, &id) {
                        Ok(snap) => render::task(&snap),
                        Err(err) => render::error(&err),
                    }
                }
            }
            "history" => {
                let limit = rest.parse::<usize>().unwrap_or(20);
                match self.client.history(&self.config.module, limit) {
                    Ok(entries) => render::history(&entries),
                    Err(err) => render::error(&err),
                }
            }
            "outputs" => match self.client.outputs(&self.config.module) {
                Ok(last) => render::last_outputs(last.as_ref()),
                Err(err) => render::error(&err),
            },
            "notes" => match self.client.notifications() {
                Ok(items) => render::notifications(&items),
                Err(err) => render::error(&err),
            },
            "config" => match self.client.api_config() {
                Ok(value) => render::json(&value),
                Err(err) => render::error(&err),
            },
            "base" => {
                if rest.is_empty() {
                    render::info(&format!("base: {}", self.config.base_url));
                } else {
                    self.config.base_url = rest.to_string();
                    self.client = HTTPClient::new(&self.config.base_url);
                    render::info("base url updated");
                }
            }
            _ => render::info("unknown command, type /help"),
        }
        false
    }

    fn task_arg(&self, rest: &str) -> Option<String> {
        if !rest.is_empty() {
            return Some(rest.to_string());
        }
        if self.config.current_task.is_none() {
            render::error("no task yet; pass an id");
        }
        self.config.current_task.clone()
    }

    fn reattach(&mut self) {
        match self.client.current(&self.config.module) {
            Ok(Some(snap)) => {
                render::info("reattached to running task");
                render::task(&snap);
                self.config.current_task = Some(snap.id);
            }
            Ok(None) => render::info(&format!("module: {}", self.config.module)),
            Err(err) => render::error(&err),
        }
    }

    fn start(&mut self, line: &str) {
        let req = StartRequest {
            instruction: line.to_string(),
            units: self.config.units,
            content: self.config.content.clone(),
        };
        match self.client.start(&self.config.module, &req) {
            Ok(id) => {
                render::info(&format!("started {}", id));
                self.config.current_task = Some(id);
            }
            Err(err) => render::error(&err),
        }
    }

    fn wait(&self, id: &str) {
        loop {
            match self.client.status(&self.config.module, id) {
                Ok(snap) if snap.is_terminal() && (snap.saved.is_some() || snap.outputs.is_empty()) => {
                    render::task(&snap);
                    render::outputs(&snap.outputs);
                    return;
                }
                Ok(_) => thread::sleep(POLL_INTERVAL),
                Err(err) => {
                    render::error(&err);
                    return;
                }
            }
        }
    }
}
