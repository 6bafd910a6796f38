use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread;

use chrono::{Datelike, Utc};
use log::{error, info, Level};
use minijinja::Environment;

use crate::config::TemplateConfig;
use crate::error::Error;
use crate::logging::LineLog;
use crate::message::OutboundMessage;
use crate::MailSender;

/// Renders a named template against a key-value model.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, name: &str, model: &HashMap<String, String>) -> Result<String, Error>;
}

/// `TemplateRenderer` backed by minijinja, loading templates from a
/// directory.
pub struct MinijinjaRenderer {
    env: Environment<'static>,
}

impl MinijinjaRenderer {
    pub fn new(directory: &Path) -> MinijinjaRenderer {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(directory));
        MinijinjaRenderer { env }
    }
}

impl TemplateRenderer for MinijinjaRenderer {
    fn render(&self, name: &str, model: &HashMap<String, String>) -> Result<String, Error> {
        Ok(self.env.get_template(name)?.render(model)?)
    }
}

/// A message described by a template plus model, bound for one recipient.
#[derive(Debug, Clone, Default)]
pub struct TemplateMessage {
    pub to: Vec<String>,
    pub subject: String,
    /// Template name as known to the renderer, e.g. `"welcome.html"`.
    pub template: String,
    pub model: HashMap<String, String>,
    pub reply_to: Option<String>,
}

struct Dispatcher {
    renderer: Box<dyn TemplateRenderer>,
    sender: Arc<dyn MailSender>,
    enabled: bool,
}

impl Dispatcher {
    fn dispatch(&self, message: &TemplateMessage) -> Result<(), Error> {
        // The model always gets the current year and the recipient address
        let mut model = message.model.clone();
        model.insert("currentYear".to_owned(), Utc::now().year().to_string());
        model.insert("email".to_owned(), message.to[0].clone());

        let body = self.renderer.render(&message.template, &model)?;

        if !self.enabled {
            info!("sending disabled. subject: {}", message.subject);
            let mut transcript = LineLog::new(Level::Info, "mxsend::template");
            let _ = transcript.write_all(body.as_bytes());
            return Ok(());
        }

        let outbound = OutboundMessage {
            to: message.to.clone(),
            subject: message.subject.clone(),
            body,
            html: true,
            reply_to: message.reply_to.clone(),
        };
        self.sender.send(&outbound)
    }
}

enum WorkerMessage {
    Dispatch(TemplateMessage),
    Terminate,
}

/// Renders templated messages and hands them to a `MailSender`.
///
/// With `use_worker` set, deliveries run on a dedicated background thread
/// so callers are not blocked on delivery latency; failures on that path
/// are logged, not returned. With `enabled` unset, rendered messages are
/// logged line by line instead of sent, which is useful in development
/// environments.
pub struct TemplateMailer {
    dispatcher: Arc<Dispatcher>,
    worker: Option<mpsc::Sender<WorkerMessage>>,
}

impl TemplateMailer {
    pub fn new(config: &TemplateConfig, sender: Arc<dyn MailSender>) -> Result<TemplateMailer, Error> {
        config.validate()?;
        let renderer = Box::new(MinijinjaRenderer::new(&config.templates));
        Ok(TemplateMailer::with_renderer(config, renderer, sender))
    }

    /// Construct with an explicit renderer.
    pub fn with_renderer(
        config: &TemplateConfig,
        renderer: Box<dyn TemplateRenderer>,
        sender: Arc<dyn MailSender>,
    ) -> TemplateMailer {
        let dispatcher = Arc::new(Dispatcher {
            renderer,
            sender,
            enabled: config.enabled,
        });

        let worker = if config.use_worker {
            let (tx, rx) = mpsc::channel();
            let worker_dispatcher = dispatcher.clone();
            let _ = thread::Builder::new()
                .name("mxsend-template".to_owned())
                .spawn(move || worker_loop(rx, worker_dispatcher));
            Some(tx)
        } else {
            None
        };

        TemplateMailer { dispatcher, worker }
    }

    /// Render and send. On the worker path this only queues; delivery
    /// failures are logged by the worker.
    pub fn send(&self, message: TemplateMessage) -> Result<(), Error> {
        if message.to.is_empty() {
            return Err(Error::InvalidRecipient(
                "\"to\" should be specified".to_owned(),
            ));
        }
        match self.worker {
            Some(ref tx) => tx
                .send(WorkerMessage::Dispatch(message))
                .map_err(|_| Error::Message("worker thread is gone".to_owned())),
            None => self.dispatcher.dispatch(&message),
        }
    }

    /// Like `send`, but logs failures instead of returning them.
    pub fn send_quietly(&self, message: TemplateMessage) {
        let to = message.to.join(", ");
        let subject = message.subject.clone();
        if let Err(e) = self.send(message) {
            error!("unable to send message: {} subject: {}: {}", to, subject, e);
        }
    }
}

impl Drop for TemplateMailer {
    fn drop(&mut self) {
        if let Some(ref tx) = self.worker {
            let _ = tx.send(WorkerMessage::Terminate);
        }
    }
}

fn worker_loop(receiver: mpsc::Receiver<WorkerMessage>, dispatcher: Arc<Dispatcher>) {
    for message in receiver.iter() {
        match message {
            WorkerMessage::Dispatch(m) => {
                if let Err(e) = dispatcher.dispatch(&m) {
                    error!(
                        "unable to send message: {} subject: {}: {}",
                        m.to.join(", "),
                        m.subject,
                        e
                    );
                }
            }
            WorkerMessage::Terminate => return,
        }
    }
}
