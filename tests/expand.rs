use crate::{command::assert_cmd_snapshot, occur};

#[test]
fn count() {
    assert_cmd_snapshot!(
        occur(["expand", "FREQ=MONTHLY;BYMONTHDAY=-1;COUNT=3", "20240101"]),
        @r"
    success: true
    exit_code: 0
    ----- stdout -----
    20240131
    20240229
    20240331

    ----- stderr -----
    ",
    );
}

#[test]
fn clamped_month_end() {
    assert_cmd_snapshot!(
        occur(["expand", "FREQ=MONTHLY;COUNT=4", "20240131"]),
        @r"
    success: true
    exit_code: 0
    ----- stdout -----
    20240131
    20240229
    20240329
    20240429

    ----- stderr -----
    ",
    );
}

#[test]
fn streamed_without_duplicates() {
    // February and March fold back onto January, which is already printed.
    assert_cmd_snapshot!(
        occur(["expand", "FREQ=DAILY;BYMONTH=1;COUNT=7", "20240129"]),
        @r"
    success: true
    exit_code: 0
    ----- stdout -----
    20240129
    20240130
    20240131

    ----- stderr -----
    ",
    );
}

#[test]
fn until_is_inclusive() {
    assert_cmd_snapshot!(
        occur([
            "expand",
            "FREQ=WEEKLY;UNTIL=20240115T090000Z;BYDAY=MO",
            "20240101T090000Z",
        ]),
        @r"
    success: true
    exit_code: 0
    ----- stdout -----
    20240101T090000Z
    20240108T090000Z
    20240115T090000Z

    ----- stderr -----
    ",
    );
}

#[test]
fn window_end_is_exclusive() {
    assert_cmd_snapshot!(
        occur([
            "expand",
            "FREQ=WEEKLY;BYDAY=MO,WE,FR",
            "20240101T090000Z",
            "-e",
            "20240115",
        ]),
        @r"
    success: true
    exit_code: 0
    ----- stdout -----
    20240101T090000Z
    20240103T090000Z
    20240105T090000Z
    20240108T090000Z
    20240110T090000Z
    20240112T090000Z

    ----- stderr -----
    ",
    );
}

/// Occurrences before the start of the window are still counted.
#[test]
fn window_start_counts_earlier_occurrences() {
    assert_cmd_snapshot!(
        occur(["expand", "FREQ=DAILY;COUNT=5", "20240101", "-s", "20240103"]),
        @r"
    success: true
    exit_code: 0
    ----- stdout -----
    20240103
    20240104
    20240105

    ----- stderr -----
    ",
    );
}

#[test]
fn last_work_day_json() {
    assert_cmd_snapshot!(
        occur([
            "expand",
            "FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1",
            "20240101T170000Z",
            "--end",
            "20240401",
            "--json",
        ]),
        @r#"
    success: true
    exit_code: 0
    ----- stdout -----
    {"value":"20240131T170000Z","instant":"2024-01-31T17:00:00Z"}
    {"value":"20240229T170000Z","instant":"2024-02-29T17:00:00Z"}
    {"value":"20240329T170000Z","instant":"2024-03-29T17:00:00Z"}

    ----- stderr -----
    "#,
    );
}

/// Daily occurrences keep their wall clock time across a DST transition.
#[test]
fn zoned_across_dst() {
    assert_cmd_snapshot!(
        occur([
            "expand",
            "FREQ=DAILY;COUNT=3",
            "TZID=America/New_York:20240309T090000",
            "--json",
        ]),
        @r#"
    success: true
    exit_code: 0
    ----- stdout -----
    {"value":"TZID=America/New_York:20240309T090000","instant":"2024-03-09T14:00:00Z"}
    {"value":"TZID=America/New_York:20240310T090000","instant":"2024-03-10T13:00:00Z"}
    {"value":"TZID=America/New_York:20240311T090000","instant":"2024-03-11T13:00:00Z"}

    ----- stderr -----
    "#,
    );
}

/// A rule that can never match stops at the period limit.
#[test]
fn max_periods() {
    let rule = "FREQ=YEARLY;BYMONTH=2;BYMONTHDAY=30";
    assert_cmd_snapshot!(
        occur(["expand", rule, "20240101", "--max-periods", "10"]),
        @r"
    success: true
    exit_code: 0
    ----- stdout -----

    ----- stderr -----
    ",
    );
    assert_cmd_snapshot!(
        occur(["expand", rule, "20240101"]).env("OCCUR_MAX_PERIODS", "10"),
        @r"
    success: true
    exit_code: 0
    ----- stdout -----

    ----- stderr -----
    ",
    );
    assert_cmd_snapshot!(
        occur(["expand", rule, "20240101"]).env("OCCUR_MAX_PERIODS", "ten"),
        @r"
    success: false
    exit_code: 1
    ----- stdout -----

    ----- stderr -----
    failed to parse OCCUR_MAX_PERIODS value `ten`: invalid digit found in string
    ",
    );
}

#[test]
fn missing_seed() {
    assert_cmd_snapshot!(
        occur(["expand", "FREQ=DAILY"]),
        @r"
    success: false
    exit_code: 1
    ----- stdout -----

    ----- stderr -----
    missing required <seed>
    ",
    );
}

#[test]
fn invalid_rule() {
    assert_cmd_snapshot!(
        occur(["expand", "FREQ=DAILY;BYHOUR=24", "20240101"]),
        @r"
    success: false
    exit_code: 1
    ----- stdout -----

    ----- stderr -----
    <rule> `FREQ=DAILY;BYHOUR=24`: invalid 'BYHOUR' value `24` (values must be in range 0..=23)
    ",
    );
}

#[test]
fn unexpected_argument() {
    assert_cmd_snapshot!(
        occur(["expand", "FREQ=DAILY", "20240101", "20240102"]),
        @r#"
    success: false
    exit_code: 1
    ----- stdout -----

    ----- stderr -----
    unexpected argument "20240102"
    "#,
    );
}
