/// Chain Linearization Demonstration
///
/// Builds three bars, daisy-chains them from the power source (entering the
/// middle bar backwards), and shows how a wire-ordered frame lands on each
/// bar's local LEDs. Run with: cargo run --example chain_demo

use glam::vec2;
use ledchain::model::{Color, LedMarker};
use ledchain::workspace::Workspace;

fn marker_char(marker: LedMarker) -> String {
    match marker {
        LedMarker::Ordered(i) => format!("{:>3}", i),
        LedMarker::Scratch(_) => "  ~".to_string(),
    }
}

fn print_bars(ws: &Workspace) {
    for bar in ws.inventory().bars() {
        let markers: Vec<String> = bar.leds.iter().map(|l| marker_char(l.marker)).collect();
        println!("  {}  local 0..{}  wire [{}]", bar.id, bar.leds.len(), markers.join(" "));
    }
}

fn print_colors(ws: &Workspace) {
    for bar in ws.inventory().bars() {
        let colors: Vec<String> = bar.leds.iter().map(|l| format!("{:06X}", l.color)).collect();
        println!("  {}  [{}]", bar.id, colors.join(" "));
    }
}

fn main() {
    env_logger::init();

    let mut ws = Workspace::new(vec2(10.0, 10.0));
    // 5 LEDs per bar: 100 px at 5 LEDs/m.
    let a = ws.add_bar(vec2(0.0, 0.0), vec2(100.0, 0.0), 5);
    let b = ws.add_bar(vec2(120.0, 0.0), vec2(220.0, 0.0), 5);
    let c = ws.add_bar(vec2(240.0, 0.0), vec2(340.0, 0.0), 5);

    let grab = |ws: &Workspace, id| {
        let bar = ws.inventory().bar(id).unwrap();
        (bar.start, bar.end)
    };
    let (a_start, a_end) = grab(&ws, a);
    let (b_start, b_end) = grab(&ws, b);
    let (c_start, _c_end) = grab(&ws, c);

    println!("wiring: power -> {a}, {a} end -> {b} END (reversed), {b} start -> {c}");
    let power = ws.power_handle();
    assert!(ws.connect(power, a_start).unwrap());
    assert!(ws.connect(a_end, b_end).unwrap());
    assert!(ws.connect(b_start, c_start).unwrap());

    println!("\nwire-order markers per bar (note {b} runs backwards):");
    print_bars(&ws);

    // A red-to-blue gradient across the whole chain, one color per LED.
    let total = ws.sequencer().len();
    let gradient: Vec<Color> = (0..total)
        .map(|i| {
            let t = i as f32 / total.saturating_sub(1).max(1) as f32;
            let r = ((1.0 - t) * 255.0) as u32;
            let bl = (t * 255.0) as u32;
            (r << 16) | bl
        })
        .collect();
    ws.apply_frame(&gradient);

    println!("\ngradient frame applied ({total} colors):");
    print_colors(&ws);

    // Unplug the power source: the order dissolves.
    let power_cable = ws.inventory().handle(power).unwrap().cable.unwrap();
    ws.remove_cable(power_cable).unwrap();
    println!("\npower unplugged, markers reset:");
    print_bars(&ws);
}
