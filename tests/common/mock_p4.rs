use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use p4checkout::error::{Error, Result};
use p4checkout::p4::{CommandOutput, CommandRunner, P4Env, RunOptions};
use p4checkout::types::{ClientSpec, Mapping};
use serde_json::{Map, Value, json};

/// One invocation seen by the mock.
#[derive(Debug, Clone)]
pub struct Call {
    pub args: Vec<String>,
    pub client: Option<String>,
    pub host: Option<String>,
    pub input: Option<String>,
    /// Whether the watched path existed when the call was made.
    pub watched_exists: bool,
}

impl Call {
    /// The arguments with the `-ztag -Mj` prefix stripped, joined by spaces.
    pub fn command(&self) -> String {
        let args: Vec<&str> = self
            .args
            .iter()
            .map(String::as_str)
            .skip_while(|a| *a == "-ztag" || *a == "-Mj")
            .collect();
        args.join(" ")
    }
}

/// An in-memory stand-in for a Perforce server reached through `p4`.
pub struct MockP4 {
    pub server_version: String,
    pub client_host: String,
    pub logged_in: bool,
    pub head_change: Option<String>,
    /// Error text `clean` fails with, if set.
    pub clean_error: Option<String>,
    clients: Mutex<HashMap<String, ClientSpec>>,
    raw_clients: Mutex<HashMap<String, Value>>,
    calls: Mutex<Vec<Call>>,
    watch: Mutex<Option<PathBuf>>,
}

impl Default for MockP4 {
    fn default() -> Self {
        Self {
            server_version: "P4D/LINUX26X86_64/2023.1/2468153 (2023/06/07)".to_string(),
            client_host: "runner-1".to_string(),
            logged_in: true,
            head_change: Some("1234".to_string()),
            clean_error: None,
            clients: Mutex::new(HashMap::new()),
            raw_clients: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            watch: Mutex::new(None),
        }
    }
}

impl MockP4 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_client(&self, spec: ClientSpec) {
        self.clients
            .lock()
            .unwrap()
            .insert(spec.name.clone(), spec);
    }

    /// Serves `record` verbatim for `client -o name`.
    pub fn add_raw_client(&self, name: &str, record: Value) {
        self.raw_clients
            .lock()
            .unwrap()
            .insert(name.to_string(), record);
    }

    pub fn client(&self, name: &str) -> Option<ClientSpec> {
        self.clients.lock().unwrap().get(name).cloned()
    }

    /// Records for every later call whether `path` exists at that moment.
    pub fn watch_path(&self, path: impl Into<PathBuf>) {
        *self.watch.lock().unwrap() = Some(path.into());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(Call::command).collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn respond(&self, env: &P4Env, args: &[&str], input: Option<&str>) -> CommandOutput {
        match args {
            ["info"] => tagged(&[json!({
                "serverVersion": self.server_version,
                "clientHost": self.client_host,
                "userName": env.user,
            })]),
            ["login", "-s"] if self.logged_in => {
                CommandOutput::success(format!("User {} ticket expires in 12 hours", env.user))
            }
            ["login", "-s"] => {
                CommandOutput::failure(1, "Perforce password (P4PASSWD) invalid or unset.")
            }
            ["client", "-o", name] => {
                if let Some(record) = self.raw_clients.lock().unwrap().get(*name) {
                    return tagged(&[record.clone()]);
                }
                let spec = self.client(name).unwrap_or_else(|| ClientSpec {
                    name: name.to_string(),
                    owner: env.user.clone(),
                    root: "/default/root".to_string(),
                    view: vec![Mapping::new("//depot/...", format!("//{name}/..."))],
                    ..Default::default()
                });
                tagged(&[client_record(&spec)])
            }
            ["clients", "-e", name] => match self.client(name) {
                Some(spec) => tagged(&[json!({ "client": spec.name, "Owner": spec.owner })]),
                None => CommandOutput::success(""),
            },
            ["client", "-i"] => {
                let spec = parse_spec_form(input.unwrap_or_default());
                let name = spec.name.clone();
                self.add_client(spec);
                CommandOutput::success(format!("Client {name} saved."))
            }
            ["changes", ..] => match &self.head_change {
                Some(change) => tagged(&[json!({ "change": change, "status": "submitted" })]),
                None => CommandOutput::success(""),
            },
            ["revert", path] => {
                CommandOutput::failure(1, format!("{path} - file(s) not opened on this client."))
            }
            ["clean", path] => match &self.clean_error {
                Some(error) => CommandOutput::failure(1, error.clone()),
                None => CommandOutput::failure(1, format!("{path} - no file(s) to reconcile.")),
            },
            _ => CommandOutput::success(""),
        }
    }
}

#[async_trait]
impl CommandRunner for MockP4 {
    async fn run(
        &self,
        env: &P4Env,
        args: &[String],
        input: Option<&[u8]>,
        options: RunOptions,
    ) -> Result<CommandOutput> {
        let input = input.map(|b| String::from_utf8_lossy(b).into_owned());
        let watched_exists = self
            .watch
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|p| p.exists());

        let call = Call {
            args: args.to_vec(),
            client: env.client.clone(),
            host: env.host.clone(),
            input: input.clone(),
            watched_exists,
        };
        let command = call.command();
        self.calls.lock().unwrap().push(call);

        let stripped: Vec<&str> = command.split(' ').collect();
        let output = self.respond(env, &stripped, input.as_deref());

        if output.exit_code != 0 && !options.allow_non_zero_exit {
            return Err(Error::CommandFailed {
                command,
                exit_code: output.exit_code,
                output: output.text(),
            });
        }
        Ok(output)
    }
}

fn tagged(records: &[Value]) -> CommandOutput {
    let lines: Vec<String> = records.iter().map(Value::to_string).collect();
    CommandOutput::success(lines.join("\n"))
}

pub fn client_record(spec: &ClientSpec) -> Value {
    let mut record = Map::new();
    record.insert("Client".into(), json!(spec.name));
    record.insert("Owner".into(), json!(spec.owner));
    record.insert("Host".into(), json!(spec.host));
    record.insert("Root".into(), json!(spec.root));
    record.insert("Description".into(), json!(spec.description));
    record.insert("Options".into(), json!(spec.options));
    record.insert("SubmitOptions".into(), json!(spec.submit_options));
    record.insert("LineEnd".into(), json!(spec.line_end));
    for (i, mapping) in spec.view.iter().enumerate() {
        record.insert(format!("View{i}"), json!(mapping.to_string()));
    }
    Value::Object(record)
}

/// Reads back the text written to `client -i`, the way the server would.
pub fn parse_spec_form(form: &str) -> ClientSpec {
    let mut spec = ClientSpec::default();
    let mut section = "";

    for line in form.lines() {
        if let Some(value) = line.strip_prefix('\t') {
            match section {
                "Description" => {
                    spec.description.push_str(value);
                    spec.description.push('\n');
                }
                "View" => spec
                    .view
                    .push(Mapping::parse_line(value).expect("valid view line")),
                _ => panic!("unexpected indented line in section {section}: {line}"),
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').expect("field line");
        let value = value.trim_start_matches('\t').to_string();
        section = match key {
            "Client" => {
                spec.name = value;
                "Client"
            }
            "Owner" => {
                spec.owner = value;
                "Owner"
            }
            "Host" => {
                spec.host = value;
                "Host"
            }
            "Root" => {
                spec.root = value;
                "Root"
            }
            "Options" => {
                spec.options = value;
                "Options"
            }
            "SubmitOptions" => {
                spec.submit_options = value;
                "SubmitOptions"
            }
            "LineEnd" => {
                spec.line_end = value;
                "LineEnd"
            }
            "Description" => "Description",
            "View" => "View",
            other => panic!("unexpected field {other}"),
        };
    }

    spec
}
