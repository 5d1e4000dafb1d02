//! Builds a small figure, drags its hand around while its feet stay planted,
//! records a snapshot after every drag, and replays the recording.
//!
//! Run with `RUST_LOG=debug` to see the solver's progress.
use std::time::Duration;

use physanim::{animation::Animation, Angle, JointId, Skeleton, Vector};

fn main() -> Result<(), physanim::Error> {
    env_logger::init();

    // The hips are the root; the spine points up and the legs point down.
    let mut skeleton = Skeleton::new(Vector::new(0., 2.), Vector::new(0., 1.));
    let neck = skeleton.add_labeled_joint("neck", JointId::ROOT, 1.5, Angle::ZERO)?;
    let elbow = skeleton.add_labeled_joint("elbow", neck, 0.8, Angle::degrees(-135.))?;
    let hand = skeleton.add_labeled_joint("hand", elbow, 0.8, Angle::degrees(30.))?;
    let knee = skeleton.add_labeled_joint("knee", JointId::ROOT, 1., Angle::degrees(170.))?;
    let foot = skeleton.add_labeled_joint("foot", knee, 1., Angle::degrees(10.))?;

    let planted_foot = skeleton.position_of(foot)?;
    print_pose("initial", &skeleton)?;

    let mut recording = Animation::default();
    recording.push(skeleton.clone())?;
    for target in [
        Vector::new(1.5, 3.5),
        Vector::new(1., 4.5),
        Vector::new(-0.5, 4.),
    ] {
        // Each drag event only gets a bounded number of iterations.
        let solution = skeleton.solve_pose(&[(foot, planted_foot), (hand, target)], Some(30))?;
        println!(
            "dragged hand towards {target:?}: {} iterations, cost {:.4}",
            solution.iterations, solution.cost
        );
        print_pose("dragged", &skeleton)?;
        recording.push(skeleton.clone())?;
    }

    let mut playback = Skeleton::default();
    let mut running = recording.start();
    let frame = Duration::from_millis(125);
    while running.update(frame, &mut playback) {
        print_pose("playback", &playback)?;
    }
    print_pose("final", &playback)?;
    Ok(())
}

fn print_pose(name: &str, skeleton: &Skeleton) -> Result<(), physanim::Error> {
    let positions = skeleton.positions()?;
    let joints = skeleton
        .joint_ids()
        .map(|id| {
            let label = skeleton[id].label();
            let label = if label.is_empty() { "root" } else { label };
            let position = positions[id.index()];
            format!("{label} ({:.2}, {:.2})", position.x, position.y)
        })
        .collect::<Vec<_>>();
    println!("{name}: {}", joints.join(", "));
    Ok(())
}
