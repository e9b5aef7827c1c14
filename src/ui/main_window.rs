use std::sync::Arc;

use chrono::Local;
use log::{info, warn};
use tokio::io::{AsyncBufRead, Lines};

use crate::api::client::ApiClient;
use crate::api::models::Partner;
use crate::app::Settings;
use crate::channel::{ConnectionManager, LoopbackChannel};
use crate::chat::view::{ChatView, HistoryRequest, Notice, NoticeLevel, Outbound, PersistRequest, Variant, ViewEvent};
use crate::directory::{self, Directory};
use crate::error::{ChatError, Result};
use crate::storage::{self, PartnerCache};
use crate::ui::{chat_view, sidebar};
use crate::utils::run_async_to_main;

const HELP: &str = "\
/doctors [term]  list doctors, optionally filtered
/open <n|id>     open a conversation
/close           close the conversation
/reload          reload the doctor list
/quit            exit
anything else is sent to the open conversation";

const MODAL_OPEN_REFUSED: &str = "This window is bound to one doctor; /open is unavailable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Doctors(String),
    Open(String),
    Close,
    Reload,
    Help,
    Quit,
    Send(String),
    Unknown(String),
    Empty,
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name {
        "doctors" | "d" => Command::Doctors(arg.to_string()),
        "open" | "o" if !arg.is_empty() => Command::Open(arg.to_string()),
        "close" => Command::Close,
        "reload" => Command::Reload,
        "help" | "h" => Command::Help,
        "quit" | "q" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Open the modal variant on this doctor only.
    pub doctor: Option<String>,
    pub offline: bool,
}

fn show_notice(notice: &Notice) {
    let prefix = match notice.level {
        NoticeLevel::Info => "-",
        NoticeLevel::Warning => "!",
        NoticeLevel::Error => "!!",
    };
    println!("{} {}", prefix, notice.text);
}

struct Session {
    settings: Settings,
    client: Arc<ApiClient>,
    directory: Directory,
    shown: Vec<Partner>,
    view: ChatView,
}

impl Session {
    fn print_doctors(&mut self, term: &str) {
        self.shown = directory::filter(self.directory.partners(), term);
        let active = self.view.active_partner().map(|p| p.id.as_str());
        for line in sidebar::render(&self.shown, active) {
            println!("{}", line);
        }
    }

    async fn reload(&mut self) {
        if let Err(e) = self.directory.load(&self.client, &self.settings.user_id).await {
            show_notice(&Notice::warning(format!("Failed to load doctors: {}", e)));
        }
    }

    fn redraw(&self) {
        println!("{}", chat_view::render_header(self.view.state()));
        let today = Local::now().date_naive();
        for line in chat_view::render_thread(
            self.view.messages(),
            self.view.current_user_id(),
            today,
            &Local,
            chat_view::THREAD_WIDTH,
        ) {
            println!("{}", line);
        }
    }

    fn open(&mut self, key: &str) {
        if self.view.variant() == Variant::Modal {
            show_notice(&Notice::info(MODAL_OPEN_REFUSED));
            return;
        }
        let partner = key
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| self.shown.get(idx))
            .or_else(|| self.directory.find(key))
            .cloned();
        match partner {
            Some(p) => self.open_partner(p),
            None => show_notice(&Notice::warning(format!("No doctor matches '{}'", key))),
        }
    }

    fn open_partner(&mut self, partner: Partner) {
        let req = self.view.select_partner(partner);
        self.fetch_history(req);
        self.redraw();
    }

    fn fetch_history(&self, req: HistoryRequest) {
        let client = self.client.clone();
        run_async_to_main(
            async move {
                let result = client.history(&req.partner_id).await;
                ViewEvent::History { token: req.token, result }
            },
            self.view.event_sender(),
        );
    }

    fn persist(&self, req: PersistRequest) {
        let client = self.client.clone();
        run_async_to_main(
            async move {
                let result = client.send_message(&req.receiver_id, &req.content).await;
                ViewEvent::Persisted { token: req.token, result }
            },
            self.view.event_sender(),
        );
    }

    fn send(&mut self, text: &str) {
        match self.view.send(text) {
            Ok(Outbound::Emitted(_)) => self.redraw(),
            Ok(Outbound::Persist(req)) => self.persist(req),
            Err(ChatError::EmptyMessage) => {}
            Err(e) => show_notice(&Notice::info(e.to_string())),
        }
    }

    /// Returns false when the session should end.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Doctors(term) => self.print_doctors(&term),
            Command::Open(key) => self.open(&key),
            Command::Close => {
                self.view.close();
                self.redraw();
            }
            Command::Reload => {
                self.reload().await;
                self.print_doctors("");
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return false,
            Command::Send(text) => self.send(&text),
            Command::Unknown(raw) => show_notice(&Notice::info(format!("Unknown command {}, try /help", raw))),
            Command::Empty => {}
        }
        true
    }

    fn apply(&mut self, event: ViewEvent) {
        if let Some(notice) = self.view.apply(event) {
            show_notice(&notice);
        }
        self.redraw();
    }
}

async fn connect(settings: &Settings, options: &RunOptions) -> ConnectionManager {
    if options.offline {
        info!("Offline mode, using loopback channel");
        return ConnectionManager::loopback(Arc::new(LoopbackChannel::new()));
    }
    match ConnectionManager::init(Some(&settings.socket_url), settings.token.as_deref()).await {
        Ok(manager) => manager,
        Err(e) => {
            warn!("Realtime connection failed: {}", e);
            show_notice(&Notice::warning(format!("Live updates unavailable: {}", e)));
            ConnectionManager::loopback(Arc::new(LoopbackChannel::new()))
        }
    }
}

pub async fn run<R>(settings: Settings, options: RunOptions, lines: &mut Lines<R>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let cache = storage::default_db_path().and_then(|path| match PartnerCache::open(&path) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!("Doctor cache disabled: {}", e);
            None
        }
    });
    let client = Arc::new(ApiClient::new(&settings.api_url, settings.token.as_deref()));
    let manager = connect(&settings, &options).await;
    let variant = if options.doctor.is_some() { Variant::Modal } else { Variant::Page };
    let view = ChatView::new(variant, &settings.user_id, manager.channel());

    let mut session = Session {
        settings,
        client,
        directory: Directory::new(cache),
        shown: Vec::new(),
        view,
    };

    if !session.directory.partners().is_empty() {
        println!("Doctors (cached):");
        session.print_doctors("");
    }
    session.reload().await;

    match options.doctor.as_deref() {
        Some(id) => {
            let partner = session.directory.resolve(id);
            session.open_partner(partner);
        }
        None => {
            println!("Doctors:");
            session.print_doctors("");
            println!("Type /help for commands.");
        }
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !session.handle(parse_command(&line)).await {
                    break;
                }
            }
            Some(event) = session.view.next_event() => session.apply(event),
        }
    }

    session.view.close();
    manager.dispose();
    Ok(())
}
