use arboard::Clipboard;
use log::{info, warn};
use macroquad::prelude::*;
use rtsmove::actor::{Actor, ActorId, Unit};
use rtsmove::config::{Config, PathfindingMode};
use rtsmove::grid::{Grid, GridMap};
use rtsmove::logging;
use rtsmove::move_state::Mode;
use rtsmove::trace::TrajectoryLog;
use rtsmove::{MoveCommand, MovementSystem, SimWorld, UnitCommand};

const CONFIG_PATH: &str = "config.toml";
/// Fixed simulation rate
const TICK_DT: f64 = 1.0 / 30.0;
/// Catch-up limit after a slow frame
const MAX_TICKS_PER_FRAME: u32 = 5;
const PANEL_HEIGHT: f32 = 120.0;

fn mode_color(mode: Option<Mode>) -> Color {
    match mode {
        None | Some(Mode::Idle) => Color::from_rgba(200, 200, 200, 255),
        Some(Mode::MovingStraight) => Color::from_rgba(80, 160, 255, 255),
        Some(Mode::Moving) => Color::from_rgba(100, 220, 120, 255),
        Some(Mode::Turning) => Color::from_rgba(240, 200, 60, 255),
        Some(Mode::Blocked) => Color::from_rgba(240, 80, 80, 255),
        Some(Mode::Arrived) => WHITE,
    }
}

/// Visualization state
struct Sandbox {
    config: Config,
    world: SimWorld,
    system: MovementSystem,
    accumulator: f64,
    paused: bool,
    trace: Option<TrajectoryLog>,
}

impl Sandbox {
    fn new(config: Config) -> Self {
        let grid = Grid::new(
            config.grid.rows,
            config.grid.cols,
            config.grid.cell_size,
            config.grid.cell_size,
        );
        let system = MovementSystem::new(config.movement.clone());
        let trace = config.logging.record_trace.then(|| TrajectoryLog::new(TICK_DT));

        Sandbox {
            config,
            world: SimWorld::new(grid),
            system,
            accumulator: 0.0,
            paused: false,
            trace,
        }
    }

    fn scale(&self) -> f32 {
        self.config.visual.pixels_per_unit
    }

    fn to_screen(&self, x: f64, z: f64) -> (f32, f32) {
        (x as f32 * self.scale(), z as f32 * self.scale())
    }

    fn to_world(&self, px: f32, py: f32) -> (f64, f64) {
        ((px / self.scale()) as f64, (py / self.scale()) as f64)
    }

    fn grid(&self) -> Option<&Grid> {
        self.world.grid.as_ref()
    }

    fn handle_input(&mut self) {
        let (mx, my) = mouse_position();
        let (wx, wz) = self.to_world(mx, my);

        // Left click: toggle wall
        if is_mouse_button_pressed(MouseButton::Left) {
            if let Some(grid) = self.world.grid.as_mut() {
                let cell = grid.metrics().world_to_cell(wx, wz);
                grid.toggle_cell(cell.col, cell.row);
            }
        }

        // Right click: order every unit to the cursor
        if is_mouse_button_pressed(MouseButton::Right) {
            self.order_all(wx, wz);
        }

        // Space: spawn a unit at the cursor
        if is_key_pressed(KeyCode::Space) {
            self.spawn_at(wx, wz);
        }

        if is_key_pressed(KeyCode::P) {
            let mode = match self.system.config().pathfinding_mode {
                PathfindingMode::AStar => PathfindingMode::FlowField,
                PathfindingMode::FlowField => PathfindingMode::AStar,
            };
            self.system.set_pathfinding_mode(mode);
        }

        if is_key_pressed(KeyCode::T) {
            let enabled = !self.system.config().steering_enabled;
            self.system.set_steering_enabled(enabled);
        }

        if is_key_pressed(KeyCode::F) {
            self.config.visual.show_flow_field = !self.config.visual.show_flow_field;
        }

        if is_key_pressed(KeyCode::X) {
            self.stop_all();
        }

        if is_key_pressed(KeyCode::Enter) {
            self.paused = !self.paused;
        }

        if is_key_pressed(KeyCode::C) {
            self.copy_to_clipboard();
        }
    }

    fn spawn_at(&mut self, x: f64, z: f64) {
        let walkable = self.grid().map_or(true, |g| g.is_walkable(x, z));
        if !walkable {
            return;
        }
        let id = self.world.next_id();
        let unit = Unit::new(
            id.0,
            x,
            z,
            self.config.units.default_radius,
            self.config.units.default_speed,
        );
        if self.world.spawn(unit) {
            info!("Spawned unit {} at ({:.2}, {:.2})", id, x, z);
        }
    }

    fn order_all(&mut self, x: f64, z: f64) {
        let orders: Vec<(ActorId, f64)> = self.world.units().iter().map(|u| (u.id, u.speed)).collect();
        for (id, speed) in orders {
            match MoveCommand::new(id, x, z, speed) {
                Ok(order) => {
                    if let Err(e) = self.system.apply(&UnitCommand::Move(order), &self.world) {
                        warn!("{}", e);
                    }
                }
                Err(e) => warn!("{}", e),
            }
        }
    }

    fn stop_all(&mut self) {
        let ids: Vec<ActorId> = self.world.units().iter().map(|u| u.id).collect();
        for id in ids {
            // Units without an order are simply skipped
            let _ = self.system.apply(&UnitCommand::Stop { agent: id }, &self.world);
        }
    }

    fn update(&mut self, frame_time: f64) {
        if self.paused {
            return;
        }
        self.accumulator += frame_time;
        let mut steps = 0;
        while self.accumulator >= TICK_DT && steps < MAX_TICKS_PER_FRAME {
            self.system.fixed_update(TICK_DT, &mut self.world);
            match self.trace.as_mut() {
                Some(trace) => trace.record(&self.world, &mut self.system),
                None => {
                    self.system.drain_events();
                }
            }
            self.accumulator -= TICK_DT;
            steps += 1;
        }
        if steps == MAX_TICKS_PER_FRAME {
            self.accumulator = 0.0;
        }
    }

    fn copy_to_clipboard(&self) {
        let Some(grid) = self.grid() else {
            return;
        };
        let layout = grid.to_layout();
        match Clipboard::new() {
            Ok(mut clipboard) => {
                if let Err(e) = clipboard.set_text(&layout) {
                    warn!("Failed to copy to clipboard: {}", e);
                } else {
                    info!("Map layout copied to clipboard");
                    // Keep clipboard alive for a moment to ensure clipboard managers can capture it
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
            }
            Err(e) => warn!("Failed to access clipboard: {}", e),
        }
    }

    fn save_trace(&self) {
        let Some(trace) = &self.trace else {
            return;
        };
        let path = &self.config.logging.trace_path;
        match trace.save_to_file(path) {
            Ok(()) => info!("Trace saved to {}\n{}", path, trace.summary()),
            Err(e) => warn!("Failed to save trace: {}", e),
        }
    }

    fn draw_grid(&self) {
        let Some(grid) = self.grid() else {
            return;
        };
        let metrics = grid.metrics();
        let cell_w = metrics.cell_width as f32 * self.scale();
        let cell_h = metrics.cell_height as f32 * self.scale();
        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let color = if grid.is_blocked(col, row) {
                    Color::from_rgba(150, 60, 60, 255)
                } else {
                    Color::from_rgba(55, 55, 55, 255)
                };
                draw_rectangle(col as f32 * cell_w, row as f32 * cell_h, cell_w - 1.0, cell_h - 1.0, color);
            }
        }
    }

    fn draw_routes(&self) {
        let visual = &self.config.visual;
        for state in self.system.agents() {
            let Some(unit) = self.world.unit(state.agent) else {
                continue;
            };
            let (tx, ty) = self.to_screen(state.target.x, state.target.y);
            draw_circle_lines(tx, ty, 4.0, 1.0, YELLOW);

            if visual.show_paths {
                if let Some(cursor) = state.path() {
                    let mut from = self.to_screen(unit.x, unit.z);
                    for node in cursor.remaining() {
                        let to = self.to_screen(node.x, node.z);
                        draw_line(from.0, from.1, to.0, to.1, 1.5, Color::from_rgba(100, 220, 120, 200));
                        draw_circle(to.0, to.1, 2.5, Color::from_rgba(100, 220, 120, 255));
                        from = to;
                    }
                }
            }
        }

        if !visual.show_flow_field {
            return;
        }
        let Some(field) = self.system.agents().find_map(|s| s.flow_field()) else {
            return;
        };
        let arrow = field.metrics.cell_width.min(field.metrics.cell_height) * 0.35;
        for (index, cell) in field.cells().iter().enumerate() {
            if !cell.is_valid() {
                continue;
            }
            let center = field.metrics.cell_center(field.metrics.cell_at(index));
            let tip = center + cell.direction * arrow;
            let (x1, y1) = self.to_screen(center.x, center.y);
            let (x2, y2) = self.to_screen(tip.x, tip.y);
            draw_line(x1, y1, x2, y2, 1.0, Color::from_rgba(120, 120, 200, 255));
        }
    }

    fn draw_units(&self) {
        for unit in self.world.units() {
            let (x, y) = self.to_screen(unit.x, unit.z);
            let color = mode_color(self.system.move_state(unit.id));
            draw_circle(x, y, unit.radius as f32 * self.scale(), color);

            let heading = (unit.rotation() as f32).to_radians();
            let len = unit.radius as f32 * self.scale();
            draw_line(x, y, x + heading.cos() * len, y + heading.sin() * len, 2.0, BLACK);
        }
    }

    fn draw(&self) {
        let visual = &self.config.visual;
        clear_background(Color::from_rgba(visual.background_r, visual.background_g, visual.background_b, 255));

        self.draw_grid();
        self.draw_routes();
        self.draw_units();

        let movement = self.system.config();
        let info = format!(
            "Tick {} | units {} | moving {} | {:?} | steering {} | flow cache {} (hits {}, misses {}){}",
            self.system.tick(),
            self.world.units().len(),
            self.system.active_count(),
            movement.pathfinding_mode,
            if movement.steering_enabled { "on" } else { "off" },
            self.system.flow_cache().len(),
            self.system.flow_cache().hits,
            self.system.flow_cache().misses,
            if self.paused { " | PAUSED" } else { "" },
        );
        let help = "Left: toggle wall  Right: move all  Space: spawn  P: A*/flow  T: steering  \
                    F: flow arrows  X: stop  Enter: pause  C: copy map  Esc: quit";
        let top = screen_height() - PANEL_HEIGHT + 30.0;
        draw_text(&info, 10.0, top, 20.0, WHITE);
        draw_text(help, 10.0, top + 26.0, 18.0, LIGHTGRAY);
    }
}

fn window_conf() -> Conf {
    let config = Config::load_or_default(CONFIG_PATH);
    let scale = config.visual.pixels_per_unit as f64 * config.grid.cell_size;
    Conf {
        window_title: config.visual.window_title.clone(),
        window_width: (config.grid.cols as f64 * scale) as i32,
        window_height: (config.grid.rows as f64 * scale) as i32 + PANEL_HEIGHT as i32,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    let config = Config::load_or_default(CONFIG_PATH);
    logging::init(config.logging.verbose);
    info!(
        "Sandbox {}x{} cells, {:?}",
        config.grid.cols, config.grid.rows, config.movement.pathfinding_mode
    );

    let mut sandbox = Sandbox::new(config);

    loop {
        // Close window on Escape
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        sandbox.handle_input();
        sandbox.update(get_frame_time() as f64);
        sandbox.draw();

        next_frame().await
    }

    sandbox.save_trace();
}
