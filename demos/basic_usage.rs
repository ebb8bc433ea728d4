/// Basic usage example: Feed pose frames, get reps and feedback
use squat_sense::{
    AnalysisResult, EngineConfig, ExerciseKind, ExerciseSession, Joint, Landmark, PoseFrame,
};

/// A person facing the camera, hips lowered by `depth` (1.0 standing).
/// `lean` shifts the shoulders sideways to simulate a rounded back.
fn frame(timestamp_ms: u64, depth: f64, lean: f32) -> PoseFrame {
    let hip = 0.9 - 0.4 * depth as f32;
    let lm = |x: f32, y: f32| Landmark::new(x, y, 0.0, 0.95);
    PoseFrame::empty(timestamp_ms)
        .with_joint(Joint::LeftShoulder, lm(0.45 + lean, hip - 0.3))
        .with_joint(Joint::RightShoulder, lm(0.55 + lean, hip - 0.3))
        .with_joint(Joint::LeftHip, lm(0.45, hip))
        .with_joint(Joint::RightHip, lm(0.55, hip))
        .with_joint(Joint::LeftKnee, lm(0.45, 0.7))
        .with_joint(Joint::RightKnee, lm(0.55, 0.7))
        .with_joint(Joint::LeftAnkle, lm(0.45, 0.9))
        .with_joint(Joint::RightAnkle, lm(0.55, 0.9))
}

fn main() {
    println!("=== Squat Sense: Basic Example ===\n");

    let mut session = match ExerciseSession::new(ExerciseKind::Squat, EngineConfig::default()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return;
        }
    };

    // Three squats at 30fps: two clean, one with a forward lean at the bottom.
    let mut ts = 0;
    let mut frames = Vec::new();
    for rep in 0..3 {
        let lean = if rep == 2 { 0.25 } else { 0.0 };
        let mut depths = vec![1.0; 8];
        depths.extend((1..=15).map(|i| 1.0 - 0.6 * i as f64 / 15.0));
        depths.extend(std::iter::repeat(0.4).take(8));
        depths.extend((1..=15).map(|i| 0.4 + 0.6 * i as f64 / 15.0));
        for depth in depths {
            let tilt = if depth < 0.6 { lean } else { 0.0 };
            frames.push(frame(ts, depth, tilt));
            ts += 33;
        }
    }
    frames.extend((0..8).map(|i| frame(ts + i * 33, 1.0, 0.0)));

    println!("Processing {} frames...\n", frames.len());

    let mut last_reps = 0;
    let mut last: Option<AnalysisResult> = None;
    for frame in &frames {
        let result = session.analyze(frame);
        if result.rep_count != last_reps {
            last_reps = result.rep_count;
            print_result(&result);
        }
        last = Some(result);
    }

    if let Some(result) = last {
        println!("\n--- Final frame ---");
        println!("Phase: {}", result.phase);
        for item in &result.feedback {
            println!("  {:?} [{:?}] {}", item.kind, item.severity, item.message);
        }
    }

    let summary = session.finalize();
    println!("\n=== Summary ===");
    println!("Reps: {} ({} rejected)", summary.rep_count, summary.rejected_reps);
    println!("Overall score: {:.1}", summary.overall_score);
    for (category, score) in summary.category_scores.iter() {
        println!("  {:<10} {:.1}", category.as_str(), score);
    }
    match summary.to_json() {
        Ok(json) => println!("\n{}", json),
        Err(e) => eprintln!("Failed to serialize summary: {}", e),
    }
}

fn print_result(result: &AnalysisResult) {
    println!("\n--- Rep {} at {}ms ---", result.rep_count, result.timestamp_ms);
    println!("Overall score: {:.1}", result.overall_score);
    if let Some(rep) = result.rep_history.last() {
        println!(
            "Rep score {:.1}: depth {:.2}, {}ms, back {:.0}°",
            rep.score, rep.metrics.depth, rep.metrics.duration_ms, rep.metrics.back_angle
        );
    }
    println!("Streak: {}", result.consecutive_good_reps);
}
