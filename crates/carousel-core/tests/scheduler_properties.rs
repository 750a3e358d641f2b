use carousel_core::{build_end_state, create_steps, ClusterState, Color, Step, StepOptions};
use carousel_test_utils::state;
use proptest::prelude::*;
use semver::Version;

fn options() -> impl Strategy<Value = StepOptions> {
    (1usize..6, 0usize..5).prop_map(|(batch, skip)| {
        StepOptions::new().with_batch_size(batch).with_skip_first_n(skip)
    })
}

fn any_state() -> impl Strategy<Value = ClusterState> {
    (0usize..20, 0usize..20).prop_map(|(blue, green)| state(blue, green))
}

fn clean_state() -> impl Strategy<Value = ClusterState> {
    (any::<bool>(), 0usize..20).prop_map(|(blue, count)| {
        if blue {
            state(count, 0)
        } else {
            state(0, count)
        }
    })
}

#[test]
fn equal_states_do_not_move() {
    let path = create_steps(&state(0, 4), &state(0, 4), &StepOptions::new());
    assert_eq!(path, vec![Step::new(0, 4)]);
}

proptest! {
    #[test]
    fn prop_path_connects_start_to_target(
        start in any_state(),
        target in any_state(),
        opts in options(),
    ) {
        let path = create_steps(&start, &target, &opts);
        prop_assert_eq!(path.first().copied(), Some(start.as_step()));
        prop_assert_eq!(path.last().copied(), Some(target.as_step()));
    }

    #[test]
    fn prop_one_color_moves_per_step(
        start in any_state(),
        target in any_state(),
        opts in options(),
    ) {
        let path = create_steps(&start, &target, &opts);
        for pair in path.windows(2) {
            let moved: Vec<_> = Color::ALL
                .iter()
                .filter(|&&c| pair[0][c] != pair[1][c])
                .collect();
            prop_assert_eq!(moved.len(), 1);

            let c = *moved[0];
            let delta = pair[0][c].abs_diff(pair[1][c]);
            prop_assert!(delta <= opts.batch_size + opts.skip_first_n);
            if opts.skip_first_n == 0 {
                prop_assert!(delta <= opts.batch_size);
            }
        }
    }

    #[test]
    fn prop_counts_move_monotonically_toward_target(
        start in any_state(),
        target in any_state(),
        opts in options(),
    ) {
        let path = create_steps(&start, &target, &opts);
        let goal = target.as_step();
        for pair in path.windows(2) {
            for c in Color::ALL {
                prop_assert!(goal[c].abs_diff(pair[1][c]) <= goal[c].abs_diff(pair[0][c]));
            }
        }
    }

    #[test]
    fn prop_groups_stay_out_of_skip_band(
        start in any_state(),
        target in any_state(),
        opts in options(),
    ) {
        let path = create_steps(&start, &target, &opts);
        let (from, goal) = (start.as_step(), target.as_step());
        for step in path.iter().skip(1) {
            for c in Color::ALL {
                let n = step[c];
                if n > 0 && n <= opts.skip_first_n {
                    prop_assert!(n == from[c] || n == goal[c], "count {} of {} inside skip band", n, c);
                }
            }
        }
    }

    #[test]
    fn prop_same_state_yields_single_step(
        start in any_state(),
        opts in options(),
    ) {
        let path = create_steps(&start, &start, &opts);
        prop_assert_eq!(path, vec![start.as_step()]);
    }

    #[test]
    fn prop_goal_of_clean_state_is_clean(
        current in clean_state(),
        nodes in 0usize..20,
        minor in 0u64..10,
    ) {
        let goal = build_end_state(&current, nodes, Version::new(1, minor, 0)).unwrap();
        prop_assert!(goal.is_clean());

        let group = current.group().unwrap();
        prop_assert_eq!(goal[group].count, 0);
        prop_assert_eq!(goal[group.other()].count, nodes);
    }
}
