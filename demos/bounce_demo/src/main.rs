use std::time::Duration;

use anyhow::Result;
use yoo2d::entity::EntityHook;
use yoo2d::{
    Camera, CameraAxis, Controls, Engine, EngineConfig, EngineHook, Entity, Hookable, KeyBind, Layer, Map, Movement,
    PhysicsConfig, RecordingRenderer, Scene, Vec2,
};

const CONFIG: &str = r##"{
    "name": "Bounce Demo",
    "width": 320,
    "height": 240,
    "background": "#202028"
}"##;

const BALLS: usize = 12;
const FRAMES: u32 = 600;

/// Headless demo: bouncing balls in a scrolling arena, a keyboard-driven
/// paddle the camera follows and a HUD layer. Runs a fixed number of frames
/// and logs entity state snapshots as JSON.
fn main() -> Result<()> {
    env_logger::init();

    let config = EngineConfig::from_json(CONFIG)?;
    let mut engine = Engine::new(config)?;

    let mut arena = Layer::new("arena");
    for i in 0..BALLS {
        let mut ball = Entity::ellipse(6.0, 6.0)?
            .with_name(format!("ball-{i}"))
            .with_position(fastrand::f32() * 600.0, fastrand::f32() * 150.0)
            .with_physics(PhysicsConfig {
                gravity: Vec2::new(0.0, 0.2),
                bounce: Vec2::new(1.0, 0.85),
                ..PhysicsConfig::default()
            });
        ball.velocity = Vec2::new(fastrand::f32() * 6.0 - 3.0, 0.0);
        ball.listen(EntityHook::CollisionStart, |ball, _| {
            log::debug!("{} hit something", ball.name);
            true
        });
        arena.add(ball);
    }

    let paddle = Entity::rectangle(60.0, 10.0)?
        .with_name("paddle")
        .with_position(300.0, 220.0)
        .with_controls(Controls::arrows())
        .with_physics(PhysicsConfig {
            movement: Movement::Horizontal,
            solid: true,
            speed: Vec2::new(6.0, 0.0),
            ..PhysicsConfig::default()
        });
    let paddle_id = paddle.id();
    arena.add(paddle);

    let hud = Layer::new("hud")
        .with_fixed(true)
        .with_screenshotable(false)
        .with_entity(Entity::rectangle(80.0, 12.0)?.with_name("score").with_position(8.0, 8.0));

    let mut scene = Scene::new("arena")
        .with_map(Map::new(640.0, 240.0))
        .with_camera(Camera::new().with_axis(CameraAxis::Horizontal))
        .with_layer(arena.with_precise(true))
        .with_layer(hud);
    scene.follow(paddle_id);
    engine.add_scene(scene);

    engine.add_key_bind(KeyBind::new(["p"], |engine: &mut Engine| {
        if engine.is_paused() {
            engine.play();
        } else {
            engine.pause();
        }
        log::info!("paused: {}", engine.is_paused());
    }));
    engine.listen(EngineHook::SceneChange, |_, event| {
        log::info!("switching to scene {:?}", event.next_scene);
        true
    });
    engine.init();

    let mut renderer = RecordingRenderer::new();
    let frame = Duration::from_secs_f64(1.0 / 60.0);
    for n in 0..FRAMES {
        drive_paddle(&mut engine, n);
        renderer.reset();
        engine.frame(frame + Duration::from_micros(fastrand::u64(0..200)), &mut renderer);

        if n % 120 == 0 {
            log_snapshot(&engine, n, renderer.drawn_since_clear().len())?;
        }
    }

    if let Some(scene) = engine.scene() {
        let mut shot = RecordingRenderer::new();
        scene.capture(&mut shot);
        log::info!("capture issued {} draw commands", shot.commands.len());
    }
    Ok(())
}

/// Sweep the paddle left and right, pausing once mid-run.
fn drive_paddle(engine: &mut Engine, frame: u32) {
    let input = engine.input_mut();
    input.release_key("ArrowLeft");
    input.release_key("ArrowRight");
    match (frame / 90) % 2 {
        0 => input.press_key("ArrowRight"),
        _ => input.press_key("ArrowLeft"),
    }
    if frame == 300 || frame == 330 {
        input.press_key("p");
    }
}

fn log_snapshot(engine: &Engine, frame: u32, drawn: usize) -> Result<()> {
    let Some(scene) = engine.scene() else {
        return Ok(());
    };
    log::info!(
        "frame {frame}: tick {} fps {} view {:?} drawn {drawn}",
        engine.tick(),
        engine.fps(),
        scene.camera.view
    );
    if let Some(arena) = scene.layer("arena") {
        for entity in arena.entities().iter().filter(|e| e.state.colliding) {
            log::info!(
                "  {} at {:?}: {}",
                entity.name,
                entity.position,
                serde_json::to_string(&entity.state)?
            );
        }
    }
    Ok(())
}
