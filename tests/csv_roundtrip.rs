use std::fs::File;
use std::io::BufReader;

use table_planner::report::{export_csv, read_csv, seatings};
use table_planner::PlanFactory;

#[test]
fn exported_plan_reads_back_identically() {
    let factory = PlanFactory::new(
        4,
        vec!["Red".into(), "Green".into(), "Blue".into(), "Gold".into()],
        (1..=13).map(|i| format!("Guest {i}")).collect(),
        None,
    );
    let mut plan = factory.new_seeded_plan(2024);
    plan.run().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.csv");
    export_csv(&plan, &path).unwrap();

    let read = read_csv(BufReader::new(File::open(&path).unwrap())).unwrap();
    assert_eq!(read, seatings(&plan));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("Guests,Round 1,Round 2,Round 3,Round 4\nGuest 1,Red,"));
    assert_eq!(text.lines().count(), 14);
}
