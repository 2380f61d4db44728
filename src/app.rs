use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use iced::widget::{column, container, image};
use iced::{event, keyboard, window, Element, Event, Length, Size, Subscription, Task, Theme};

use crate::audio::decoder::{Decoder, LoadError};
use crate::audio::engine::{self, EngineHandle};
use crate::audio::types::{AudioCommand, AudioData, AudioEvent};
use crate::config::PlayerConfig;
use crate::player::{RedrawDriver, WaveformPlayer};
use crate::ui::controls::{self, ControlMessage};

const WINDOW_SIZE: (f32, f32) = (1000.0, 400.0);
const PADDING: f32 = 10.0;
/// Poll rate for engine position updates while a track is loaded.
const POSITION_POLL: Duration = Duration::from_millis(16);

pub struct App {
    player: WaveformPlayer<EngineHandle>,
    decoder: Decoder,
    url_input: String,
    surface_width: f32,
    surface_height: f32,
    scale_factor: f32,

    // Last uploaded frame
    frame: image::Handle,
    frame_revision: u64,
}

#[derive(Debug, Clone)]
pub enum Message {
    EngineReady(Result<(Sender<AudioCommand>, Receiver<AudioEvent>), String>),
    ScaleFactorChanged(f32),
    Control(ControlMessage),
    FileDialogResult(Option<PathBuf>),
    Decoded(u64, Result<Arc<AudioData>, LoadError>),
    Frame(Instant),
    PositionTick,
    WindowResized(Size),
    TogglePlayback,
}

impl App {
    fn new(config: PlayerConfig) -> Self {
        let surface_width = WINDOW_SIZE.0 - 2.0 * PADDING;
        let surface_height = config.surface.fallback_height;
        // Corrected once the window reports its real scale factor.
        let scale_factor = 1.0;

        // The output device opens in the background; see `Message::EngineReady`.
        let mut player = WaveformPlayer::new(
            EngineHandle::detached(),
            config.surface,
            config.palette.resolve(),
        );
        player.resize(surface_width, surface_height, scale_factor);

        let mut app = App {
            player,
            decoder: Decoder::default(),
            url_input: String::new(),
            surface_width,
            surface_height,
            scale_factor,
            frame: image::Handle::from_rgba(1, 1, vec![0u8; 4]),
            frame_revision: 0,
        };
        app.refresh_frame();
        app
    }

    /// Hand the URL to the player and run the fetch/decode it asks for.
    fn load(&mut self, url: Option<String>) -> Task<Message> {
        let Some(request) = self.player.load(url.as_deref()) else {
            return Task::none();
        };

        let decoder = self.decoder.clone();
        Task::perform(
            async move {
                let result = decoder.decode(&request.url).await.map(Arc::new);
                (request.generation, result)
            },
            |(generation, result)| Message::Decoded(generation, result),
        )
    }

    /// Re-upload the surface if the player drew since last time.
    fn refresh_frame(&mut self) {
        let renderer = self.player.renderer();
        if renderer.revision() == self.frame_revision {
            return;
        }
        self.frame_revision = renderer.revision();
        self.frame = image::Handle::from_rgba(renderer.width(), renderer.height(), renderer.rgba());
    }
}

fn title(app: &App) -> String {
    match app.player.resource() {
        Some(resource) => format!("waveplay - {}", resource.url),
        None => "waveplay".to_string(),
    }
}

fn update(app: &mut App, message: Message) -> Task<Message> {
    let task = match message {
        Message::EngineReady(result) => {
            match result {
                Ok((tx, rx)) => app.player.transport_mut().attach(tx, rx),
                Err(e) => log::warn!("Audio engine unavailable, playback is silent: {e}"),
            }
            Task::none()
        }
        Message::ScaleFactorChanged(factor) => {
            log::debug!("Window scale factor {factor}");
            app.scale_factor = factor;
            app.player
                .resize(app.surface_width, app.surface_height, app.scale_factor);
            Task::none()
        }
        Message::Control(ctrl) => match ctrl {
            ControlMessage::OpenFile => Task::perform(
                async {
                    let handle = rfd::AsyncFileDialog::new()
                        .add_filter("Audio", &["mp3", "wav", "flac", "aac", "m4a"])
                        .pick_file()
                        .await;
                    handle.map(|h| h.path().to_path_buf())
                },
                Message::FileDialogResult,
            ),
            ControlMessage::UrlChanged(url) => {
                app.url_input = url;
                Task::none()
            }
            ControlMessage::LoadUrl => {
                let url = app.url_input.trim().to_string();
                app.load(Some(url))
            }
            ControlMessage::PlayPause => {
                app.player.toggle_play();
                Task::none()
            }
            ControlMessage::Seek(value) => {
                app.player.seek(value.round().max(0.0) as u16);
                Task::none()
            }
        },
        Message::FileDialogResult(path) => match path {
            Some(path) => {
                let url = path.to_string_lossy().to_string();
                app.url_input = url.clone();
                app.load(Some(url))
            }
            None => Task::none(),
        },
        Message::Decoded(generation, result) => {
            app.player.complete_load(generation, result);
            Task::none()
        }
        Message::Frame(now) => {
            app.player.on_frame(now);
            Task::none()
        }
        Message::PositionTick => {
            app.player.on_position_update();
            Task::none()
        }
        Message::WindowResized(size) => {
            app.surface_width = size.width - 2.0 * PADDING;
            app.player
                .resize(app.surface_width, app.surface_height, app.scale_factor);
            Task::none()
        }
        Message::TogglePlayback => {
            app.player.toggle_play();
            Task::none()
        }
    };

    app.refresh_frame();
    task
}

fn view(app: &App) -> Element<'_, Message> {
    let controls = controls::view_controls(app.player.readout(), &app.url_input)
        .map(Message::Control);

    let renderer = app.player.renderer();
    let ratio = renderer.pixel_ratio();
    let waveform = image(app.frame.clone())
        .width(Length::Fixed(renderer.width() as f32 / ratio))
        .height(Length::Fixed(renderer.height() as f32 / ratio));

    let content = column![controls, container(waveform).padding(PADDING)].spacing(5);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn subscription(app: &App) -> Subscription<Message> {
    let redraw = match app.player.active_driver() {
        Some(RedrawDriver::EveryFrame) => window::frames().map(Message::Frame),
        Some(RedrawDriver::OnPositionUpdate) => {
            iced::time::every(POSITION_POLL).map(|_| Message::PositionTick)
        }
        None => Subscription::none(),
    };

    let resize = window::resize_events().map(|(_id, size)| Message::WindowResized(size));
    let events = event::listen_with(runtime_event);

    Subscription::batch([redraw, resize, events])
}

fn runtime_event(event: Event, status: event::Status, _id: window::Id) -> Option<Message> {
    match event {
        Event::Window(window::Event::Rescaled(factor)) => Some(Message::ScaleFactorChanged(factor)),
        Event::Keyboard(keyboard::Event::KeyPressed { key, .. })
            if is_play_shortcut(&key, status) =>
        {
            Some(Message::TogglePlayback)
        }
        _ => None,
    }
}

/// Space toggles playback unless a widget (the URL field) already took the key.
fn is_play_shortcut(key: &keyboard::Key, status: event::Status) -> bool {
    status == event::Status::Ignored
        && matches!(key.as_ref(), keyboard::Key::Named(keyboard::key::Named::Space))
}

fn start_engine() -> Task<Message> {
    Task::perform(
        async {
            match tokio::task::spawn_blocking(engine::spawn_engine).await {
                Ok(result) => result.map_err(|e| format!("{e:#}")),
                Err(e) => Err(format!("engine start-up task failed: {e}")),
            }
        },
        Message::EngineReady,
    )
}

fn query_scale_factor() -> Task<Message> {
    window::oldest()
        .and_then(window::scale_factor)
        .map(Message::ScaleFactorChanged)
}

fn theme(_app: &App) -> Theme {
    Theme::Dark
}

pub fn run(config: PlayerConfig, initial_url: Option<String>) -> iced::Result {
    let boot = move || {
        let mut app = App::new(config.clone());
        let load = app.load(initial_url.clone());
        (app, Task::batch([start_engine(), query_scale_factor(), load]))
    };

    iced::application(boot, update, view)
        .title(title)
        .subscription(subscription)
        .theme(theme)
        .window_size(WINDOW_SIZE)
        .run()
}
