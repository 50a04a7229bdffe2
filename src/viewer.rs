use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use eframe::egui;
use image::imageops::FilterType;
use image::DynamicImage;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::exiftool::WriteError;
use crate::orientation::{Command, Effect};
use crate::pose::Pose;
use crate::session::{Session, State};
use crate::sphere::{self, Sphere};

/// Where the viewer leaves the result of its single commit for the caller.
pub type CommitSlot = Rc<RefCell<Option<Result<Pose, WriteError>>>>;

const HELP: &str = "drag: look around   z/c: pitch   a/d: roll   q/e: heading\n\
                    h: reset view   r: reset correction   j/l: snap view   g: grid   esc: save & exit";

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to load {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

// `path` only names the file in errors; the bytes are already in memory.
pub fn decode(path: &Path, bytes: &[u8]) -> Result<DynamicImage, LoadError> {
    image::load_from_memory(bytes).map_err(|source| LoadError::Decode { path: path.to_path_buf(), source })
}

pub fn fit_texture(image: DynamicImage, max_side: u32) -> DynamicImage {
    if image.width() <= max_side && image.height() <= max_side {
        return image;
    }
    info!(
        width = image.width(),
        height = image.height(),
        max_side,
        "downscaling panorama to fit the GPU"
    );
    image.resize(max_side, max_side, FilterType::Triangle)
}

pub fn command_for_key(key: egui::Key) -> Option<Command> {
    use egui::Key;
    let command = match key {
        Key::Z => Command::PitchUp,
        Key::C => Command::PitchDown,
        Key::A => Command::RollUp,
        Key::D => Command::RollDown,
        Key::Q => Command::HeadingUp,
        Key::E => Command::HeadingDown,
        Key::H => Command::ResetView,
        Key::R => Command::ResetCorrection,
        Key::J => Command::SnapRight,
        Key::L => Command::SnapLeft,
        _ => return None,
    };
    Some(command)
}

// Auto-repeat is dropped: holding a key applies its command once.
pub fn commands_from_events(events: &[egui::Event]) -> Vec<Command> {
    events
        .iter()
        .filter_map(|event| match event {
            egui::Event::Key { key, pressed: true, repeat: false, modifiers, .. }
                if !modifiers.command =>
            {
                command_for_key(*key)
            }
            _ => None,
        })
        .collect()
}

pub struct PanoViewer {
    session: Session,
    // Decoded image waiting for the first frame, when the GPU limits are known.
    pending: Option<DynamicImage>,
    texture: Option<egui::TextureHandle>,
    sphere: Sphere,
    show_grid: bool,
    committed: CommitSlot,
}

impl PanoViewer {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        session: Session,
        image: DynamicImage,
        committed: CommitSlot,
    ) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        Self {
            session,
            pending: Some(image),
            texture: None,
            sphere: Sphere::default(),
            show_grid: true,
            committed,
        }
    }

    fn upload_pending(&mut self, ctx: &egui::Context) {
        let Some(image) = self.pending.take() else {
            return;
        };
        let max_side = ctx.input(|i| i.max_texture_side) as u32;
        let rgba = fit_texture(image, max_side).to_rgba8();
        let size = [rgba.width() as usize, rgba.height() as usize];
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
        self.texture = Some(ctx.load_texture("panorama", color_image, egui::TextureOptions::LINEAR));
        debug!(?size, "panorama uploaded");
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        let commands = ctx.input(|i| commands_from_events(&i.events));
        for command in commands {
            match self.session.apply(command) {
                Some(Effect::Correction(pose)) => {
                    println!("{pose}");
                    ctx.request_repaint();
                }
                Some(Effect::View) => ctx.request_repaint(),
                None => {}
            }
        }

        if ctx.input(|i| i.key_pressed(egui::Key::G)) {
            self.show_grid = !self.show_grid;
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn commit(&mut self) {
        let Some(result) = self.session.terminate() else {
            return;
        };
        println!("exit");
        match &result {
            Ok(pose) => info!(path = %self.session.path().display(), %pose, "correction written"),
            Err(e) => error!(path = %self.session.path().display(), "failed to write correction: {e}"),
        }
        *self.committed.borrow_mut() = Some(result);
    }
}

fn paint_hud(painter: &egui::Painter, rect: egui::Rect, correction: Pose) {
    painter.text(
        rect.left_top() + egui::vec2(8.0, 8.0),
        egui::Align2::LEFT_TOP,
        format!("{correction}\n{HELP}"),
        egui::FontId::monospace(13.0),
        egui::Color32::YELLOW,
    );
}

impl eframe::App for PanoViewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) {
            self.commit();
        }
        if self.session.state() == State::Terminated {
            return;
        }

        self.upload_pending(ctx);
        self.handle_keys(ctx);

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                let (rect, response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::drag());

                if response.dragged_by(egui::PointerButton::Primary) {
                    let delta = response.drag_delta();
                    if delta != egui::Vec2::ZERO && self.session.drag(delta.x as f64, delta.y as f64) {
                        ctx.request_repaint();
                    }
                }

                let painter = ui.painter_at(rect);
                if let Some(texture) = &self.texture {
                    let rotation = self.session.orientation().rotation();
                    painter.add(self.sphere.mesh(rotation, rect, texture.id()));
                }
                if self.show_grid {
                    sphere::paint_grid(&painter, rect);
                }
                paint_hud(&painter, rect, self.session.orientation().correction());
            });
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        [0.0, 0.0, 0.0, 1.0]
    }
}
