//! End-to-end conformance checks for the compositing pipeline: the
//! layer-table contract, mask routing and Inner/Outer semantics, the
//! frame-buffer publish contract, and the boundary record layout.

use std::sync::{Arc, Mutex};

use strata_core::Surface;
use strata_layers::{LayerRecord, MAX_LAYERS};
use strata_render::{
    Engine, NullTransport, ShareTransport, SharedTextureSink, SharedTextureSource,
};

const CANVAS: u32 = 200;

fn engine() -> Engine {
    let mut engine = Engine::new();
    assert!(engine.initialize(CANVAS, CANVAS, 50.0).is_ok());
    engine
}

fn run_frame(engine: &mut Engine) {
    engine.begin_frame();
    engine.render();
    engine.end_frame();
    engine.present();
}

fn rect_record(id: i32, x: f32, y: f32, w: f32, h: f32) -> LayerRecord {
    let mut r = LayerRecord::zeroed();
    r.id = id;
    r.active = 1;
    r.layer_type = 0; // rectangle
    r.pos_x = x;
    r.pos_y = y;
    r.size_x = w;
    r.size_y = h;
    r.anchor_x = 0.5;
    r.anchor_y = 0.5;
    r.opacity = 1.0;
    r.color_r = 1.0;
    r.color_g = 1.0;
    r.color_b = 1.0;
    r.color_a = 1.0;
    r
}

fn mask_record(id: i32, x: f32, y: f32, w: f32, h: f32, mode: i32, targets: &[i32]) -> LayerRecord {
    let mut r = rect_record(id, x, y, w, h);
    r.layer_type = 5; // mask
    r.mask_mode = mode;
    r.set_mask_targets(targets);
    r
}

fn pixel_at(engine: &Engine, x: u32, y: u32) -> [u8; 4] {
    let lease = engine.lock_frame_buffer().expect("engine initialized");
    let stride = lease.stride() as usize;
    let offset = (y as usize) * stride + (x as usize) * 4;
    let px = lease.pixels();
    [px[offset], px[offset + 1], px[offset + 2], px[offset + 3]]
}

#[test]
fn layer_table_round_trips_every_slot() {
    let engine = engine();
    for n in 0..=MAX_LAYERS as i32 {
        engine.set_layer_count(n);
        for i in 0..n {
            let mut r = rect_record(i, i as f32, i as f32 * 2.0, 10.0, 10.0);
            r.set_text(&format!("layer {i}"));
            engine.update_layer(i, &r);
        }
        for i in 0..n {
            let back = engine.layer(i).expect("in-range index");
            assert_eq!(back.id, i);
            assert_eq!(back.pos_x, i as f32);
            assert_eq!(back.text(), format!("layer {i}"));
        }
    }

    engine.clear_layers();
    assert_eq!(engine.layer(0).unwrap().id, 0);
}

#[test]
fn inner_mask_shows_fill_only_inside() {
    let mut engine = engine();
    // Layer id 1: full-canvas white fill. A 100x100 Inner mask centered
    // on the canvas targets it.
    engine.update_layer(0, &rect_record(1, 100.0, 100.0, CANVAS as f32, CANVAS as f32));
    engine.update_layer(1, &mask_record(2, 100.0, 100.0, 100.0, 100.0, 0, &[1]));
    engine.set_layer_count(2);

    run_frame(&mut engine);

    // Inside the mask region.
    assert_eq!(pixel_at(&engine, 100, 100), [255, 255, 255, 255]);
    assert_eq!(pixel_at(&engine, 60, 60), [255, 255, 255, 255]);
    // Outside it: nothing.
    assert_eq!(pixel_at(&engine, 10, 10), [0, 0, 0, 0]);
    assert_eq!(pixel_at(&engine, 190, 100), [0, 0, 0, 0]);
}

#[test]
fn outer_mask_shows_fill_only_outside() {
    let mut engine = engine();
    engine.update_layer(0, &rect_record(1, 100.0, 100.0, CANVAS as f32, CANVAS as f32));
    engine.update_layer(1, &mask_record(2, 100.0, 100.0, 100.0, 100.0, 1, &[1]));
    engine.set_layer_count(2);

    run_frame(&mut engine);

    assert_eq!(pixel_at(&engine, 100, 100), [0, 0, 0, 0]);
    assert_eq!(pixel_at(&engine, 10, 10), [255, 255, 255, 255]);
    assert_eq!(pixel_at(&engine, 190, 100), [255, 255, 255, 255]);
}

#[test]
fn mask_routes_only_listed_targets() {
    let mut engine = engine();
    // Two half-canvas fills: id 5 (left), id 9 (right), and id 7 that
    // the mask does not list. Invalid target 999 must be ignored.
    engine.update_layer(0, &rect_record(5, 50.0, 50.0, 100.0, 100.0));
    engine.update_layer(1, &rect_record(9, 150.0, 50.0, 100.0, 100.0));
    engine.update_layer(2, &rect_record(7, 100.0, 150.0, 200.0, 100.0));
    engine.update_layer(
        3,
        &mask_record(2, 100.0, 50.0, 40.0, 40.0, 0, &[5, 9, 999]),
    );
    engine.set_layer_count(4);

    run_frame(&mut engine);

    // Masked: ids 5 and 9 survive only inside the 40x40 window around
    // (100, 50).
    assert_eq!(pixel_at(&engine, 90, 50), [255, 255, 255, 255]);
    assert_eq!(pixel_at(&engine, 110, 50), [255, 255, 255, 255]);
    assert_eq!(pixel_at(&engine, 20, 50), [0, 0, 0, 0]);
    assert_eq!(pixel_at(&engine, 180, 50), [0, 0, 0, 0]);
    // Unlisted id 7 renders unmasked across the bottom half.
    assert_eq!(pixel_at(&engine, 20, 150), [255, 255, 255, 255]);
    assert_eq!(pixel_at(&engine, 180, 150), [255, 255, 255, 255]);
}

#[test]
fn group_layers_never_render() {
    let mut engine = engine();
    let mut group = rect_record(1, 100.0, 100.0, CANVAS as f32, CANVAS as f32);
    group.layer_type = 6;
    engine.update_layer(0, &group);
    engine.set_layer_count(1);

    run_frame(&mut engine);
    assert_eq!(pixel_at(&engine, 100, 100), [0, 0, 0, 0]);
}

#[test]
fn mask_layers_draw_only_as_debug_preview() {
    let mut engine = engine();
    engine.update_layer(1, &mask_record(2, 100.0, 100.0, 80.0, 80.0, 0, &[42]));
    engine.set_layer_count(2);

    run_frame(&mut engine);
    assert_eq!(pixel_at(&engine, 100, 100), [0, 0, 0, 0]);

    engine.set_show_bounds(true);
    run_frame(&mut engine);
    assert_ne!(pixel_at(&engine, 100, 100), [0, 0, 0, 0]);
}

#[test]
fn publish_drops_while_reader_holds_the_lease() {
    let mut engine = engine();
    engine.update_layer(0, &rect_record(1, 100.0, 100.0, 50.0, 50.0));
    engine.set_layer_count(1);
    run_frame(&mut engine);

    let publisher = engine.frame_publisher().expect("engine initialized");
    assert_eq!(publisher.dropped_writes(), 0);

    {
        let lease = publisher.lock();
        let stamped = lease.frame_number();

        // The next frame renders while the reader still holds the
        // region: the publish must drop, not stall.
        let start = std::time::Instant::now();
        run_frame(&mut engine);
        assert!(start.elapsed() < std::time::Duration::from_millis(200));
        assert_eq!(publisher.dropped_writes(), 1);
        // The held region kept its old stamp.
        assert_eq!(lease.frame_number(), stamped);
    }

    // Reader released: the following frame publishes again.
    run_frame(&mut engine);
    assert_eq!(publisher.dropped_writes(), 1);
    let lease = publisher.lock();
    assert!(lease.frame_number() > 0);
}

#[test]
fn record_layout_is_the_documented_contract() {
    assert_eq!(LayerRecord::STRUCT_SIZE, 2832);
    assert_eq!(LayerRecord::offset_pos_x(), 12);
    assert_eq!(LayerRecord::offset_size_x(), 20);
    assert_eq!(LayerRecord::offset_opacity(), 48);
    assert_eq!(LayerRecord::offset_text_content(), 104);
}

#[test]
fn masked_text_layer_is_a_soft_failure_without_fonts() {
    let mut engine = engine();
    let mut text = rect_record(3, 100.0, 100.0, 120.0, 40.0);
    text.layer_type = 2;
    text.set_text("ON AIR");
    text.set_font_family("Arial");
    text.font_size = 24.0;
    engine.update_layer(0, &text);
    engine.update_layer(1, &mask_record(4, 100.0, 100.0, 60.0, 60.0, 0, &[3]));
    engine.set_layer_count(2);

    // No fonts are registered: the draw skips, the frame still runs.
    run_frame(&mut engine);
    assert_eq!(engine.frame_number(), 1);
}

// ---- Share transport ------------------------------------------------

#[derive(Default)]
struct HubState {
    frames: Mutex<Vec<(String, i64)>>,
    sources: Mutex<Vec<String>>,
}

struct TestTransport {
    hub: Arc<HubState>,
}

struct TestSink {
    name: String,
    hub: Arc<HubState>,
}

impl SharedTextureSink for TestSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&mut self, _frame: &Surface, frame_number: i64) {
        self.hub
            .frames
            .lock()
            .unwrap()
            .push((self.name.clone(), frame_number));
    }
}

struct TestSource {
    name: String,
}

impl SharedTextureSource for TestSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn latest(&mut self) -> Option<Surface> {
        Some(Surface::solid(4, 4, &strata_core::Color::BLUE))
    }
}

impl ShareTransport for TestTransport {
    fn sender_names(&self) -> Vec<String> {
        self.hub.sources.lock().unwrap().clone()
    }

    fn open_receiver(&self, sender_name: &str) -> Option<Box<dyn SharedTextureSource>> {
        self.hub
            .sources
            .lock()
            .unwrap()
            .contains(&sender_name.to_string())
            .then(|| {
                Box::new(TestSource {
                    name: sender_name.to_string(),
                }) as Box<dyn SharedTextureSource>
            })
    }

    fn create_sender(&self, name: &str) -> Option<Box<dyn SharedTextureSink>> {
        Some(Box::new(TestSink {
            name: name.to_string(),
            hub: self.hub.clone(),
        }))
    }
}

#[test]
fn present_publishes_through_enabled_share_output() {
    let hub = Arc::new(HubState::default());
    let mut engine = Engine::new().with_transport(Box::new(TestTransport { hub: hub.clone() }));
    assert!(engine.initialize(64, 64, 50.0).is_ok());

    // Nothing published while output is disabled.
    run_frame(&mut engine);
    assert!(hub.frames.lock().unwrap().is_empty());

    assert!(engine.enable_share_output("program"));
    assert!(engine.is_share_output_enabled());
    run_frame(&mut engine);
    run_frame(&mut engine);
    assert_eq!(hub.frames.lock().unwrap().len(), 2);

    engine.disable_share_output();
    assert!(!engine.is_share_output_enabled());
    run_frame(&mut engine);
    assert_eq!(hub.frames.lock().unwrap().len(), 2);
}

#[test]
fn share_inputs_enumerate_connect_disconnect() {
    let hub = Arc::new(HubState::default());
    hub.sources.lock().unwrap().push("camera-1".to_string());
    let mut engine = Engine::new().with_transport(Box::new(TestTransport { hub }));
    assert!(engine.initialize(64, 64, 50.0).is_ok());

    assert_eq!(engine.shared_sender_count(), 1);
    assert_eq!(engine.shared_sender_name(0).as_deref(), Some("camera-1"));
    assert!(engine.shared_sender_name(1).is_none());

    let id = engine.connect_shared_input("camera-1");
    assert!(id > 0);
    assert_eq!(engine.connect_shared_input("missing"), -1);
    engine.disconnect_shared_input(id);
}

#[test]
fn null_transport_engine_still_runs() {
    let mut engine = Engine::new().with_transport(Box::new(NullTransport));
    assert!(engine.initialize(64, 64, 50.0).is_ok());
    assert!(!engine.enable_share_output("anything"));
    run_frame(&mut engine);
    assert_eq!(engine.frame_number(), 1);
}
