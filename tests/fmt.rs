use crate::{command::assert_cmd_snapshot, occur};

#[test]
fn canonical_order() {
    assert_cmd_snapshot!(
        occur([
            "fmt",
            "rrule:count=3;byday=mo,fr;freq=weekly",
            "FREQ=YEARLY;BYSETPOS=-1;BYMONTH=3;INTERVAL=1",
        ]),
        @r"
    success: true
    exit_code: 0
    ----- stdout -----
    FREQ=WEEKLY;COUNT=3;BYDAY=MO,FR
    FREQ=YEARLY;INTERVAL=1;BYMONTH=3;BYSETPOS=-1

    ----- stderr -----
    ",
    );
}

#[test]
fn until_in_utc() {
    assert_cmd_snapshot!(
        occur(["fmt", "FREQ=DAILY;UNTIL=20240301T120000"]),
        @r"
    success: true
    exit_code: 0
    ----- stdout -----
    FREQ=DAILY;UNTIL=20240301T120000Z

    ----- stderr -----
    ",
    );
}

#[test]
fn stdin() {
    assert_cmd_snapshot!(
        occur(["fmt"]).stdin("FREQ=DAILY\n\nfreq=yearly;bymonth=3\n"),
        @r"
    success: true
    exit_code: 0
    ----- stdout -----
    FREQ=DAILY
    FREQ=YEARLY;BYMONTH=3

    ----- stderr -----
    ",
    );
}

#[test]
fn stdin_error_has_line_number() {
    assert_cmd_snapshot!(
        occur(["fmt"]).stdin("FREQ=DAILY\nFREQ=DAILY;COUNT=3;COUNT=4\n"),
        @r"
    success: false
    exit_code: 1
    ----- stdout -----
    FREQ=DAILY

    ----- stderr -----
    line 2 of <stdin>: recurrence rule part `COUNT` was given more than once
    ",
    );
}

#[test]
fn missing_frequency() {
    assert_cmd_snapshot!(
        occur(["fmt", "COUNT=5"]),
        @r"
    success: false
    exit_code: 1
    ----- stdout -----

    ----- stderr -----
    <rule> `COUNT=5`: recurrence rule is missing required 'FREQ' part
    ",
    );
}
