use criterion::{criterion_group, criterion_main, Criterion};

use strata_layers::LayerRecord;
use strata_render::Engine;

fn rect(id: i32, x: f32, y: f32, w: f32, h: f32) -> LayerRecord {
    let mut r = LayerRecord::zeroed();
    r.id = id;
    r.active = 1;
    r.pos_x = x;
    r.pos_y = y;
    r.size_x = w;
    r.size_y = h;
    r.anchor_x = 0.5;
    r.anchor_y = 0.5;
    r.opacity = 1.0;
    r.color_r = 0.8;
    r.color_g = 0.2;
    r.color_b = 0.4;
    r.color_a = 1.0;
    r
}

fn bench_composite(c: &mut Criterion) {
    let mut engine = Engine::new();
    assert!(engine.initialize(1280, 720, 50.0).is_ok());

    // A representative broadcast scene: background fill, a rotated
    // banner, a circle bug, and a masked highlight.
    engine.update_layer(0, &rect(1, 640.0, 360.0, 1280.0, 720.0));
    let mut banner = rect(2, 640.0, 600.0, 900.0, 120.0);
    banner.rot_z = 2.0;
    engine.update_layer(1, &banner);
    let mut bug = rect(3, 1180.0, 80.0, 120.0, 120.0);
    bug.layer_type = 1; // circle
    engine.update_layer(2, &bug);
    engine.update_layer(3, &rect(4, 640.0, 360.0, 1280.0, 720.0));
    let mut mask = rect(5, 320.0, 360.0, 400.0, 300.0);
    mask.layer_type = 5;
    mask.set_mask_targets(&[4]);
    engine.update_layer(4, &mask);
    engine.set_layer_count(5);

    c.bench_function("composite_720p_five_layers", |b| {
        b.iter(|| {
            engine.begin_frame();
            engine.render();
            engine.end_frame();
            engine.present();
        });
    });
}

criterion_group!(benches, bench_composite);
criterion_main!(benches);
