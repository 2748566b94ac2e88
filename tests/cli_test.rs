use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn commands_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "op, actor, number, counterparty, amount, remarks").unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

#[test]
fn test_full_payment_flow() {
    let file = commands_file(&[
        "vendor, 1, VND-1, , , Acme Works",
        "contract, 1, CT-1, VND-1, 100000000,",
        "approver, 1, CT-1, 2, , finance review",
        "ticket, 1, TKT-1, CT-1, 40000000,",
        "submit, 1, TKT-1, , ,",
        "approve, 1, TKT-1, , , looks good",
        "approve, 2, TKT-1, , ,",
        "pay, 1, TKT-1, , , TF-1",
    ]);

    let mut cmd = Command::new(cargo_bin!("paytrack"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "contract,CT-1,100000000,40000000,60000000",
        ))
        .stdout(predicate::str::contains("ticket,TKT-1,CT-1,40000000,paid"));
}

#[test]
fn test_over_ceiling_submit_is_reported() {
    let file = commands_file(&[
        "vendor, 1, VND-1, , , Acme Works",
        "contract, 1, CT-1, VND-1, 100000000,",
        "ticket, 1, TKT-1, CT-1, 150000000,",
        "submit, 1, TKT-1, , ,",
    ]);

    let mut cmd = Command::new(cargo_bin!("paytrack"));
    cmd.arg(file.path());

    // The submit fails but the run continues; the ticket stays draft.
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("exceed the contract amount"))
        .stdout(predicate::str::contains("ticket,TKT-1,CT-1,150000000,draft"))
        .stdout(predicate::str::contains(
            "contract,CT-1,100000000,0,100000000",
        ));
}

#[test]
fn test_out_of_turn_approval_is_reported() {
    let file = commands_file(&[
        "vendor, 1, VND-1, , , Acme Works",
        "contract, 1, CT-1, VND-1, 100000000,",
        "approver, 1, CT-1, 2, , finance review",
        "ticket, 1, TKT-1, CT-1, 40000000,",
        "submit, 1, TKT-1, , ,",
        "approve, 2, TKT-1, , ,",
    ]);

    let mut cmd = Command::new(cargo_bin!("paytrack"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("not your turn"))
        .stdout(predicate::str::contains("ticket,TKT-1,CT-1,40000000,pending"));
}

#[test]
fn test_rejection_is_terminal_in_stream() {
    let file = commands_file(&[
        "vendor, 1, VND-1, , , Acme Works",
        "contract, 1, CT-1, VND-1, 100000000,",
        "approver, 1, CT-1, 2, , finance review",
        "ticket, 1, TKT-1, CT-1, 40000000,",
        "submit, 1, TKT-1, , ,",
        "reject, 1, TKT-1, , , budget frozen",
        "approve, 2, TKT-1, , ,",
        "pay, 1, TKT-1, , , TF-1",
    ]);

    let mut cmd = Command::new(cargo_bin!("paytrack"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "ticket,TKT-1,CT-1,40000000,rejected",
        ))
        .stdout(predicate::str::contains(
            "contract,CT-1,100000000,0,100000000",
        ));
}

#[test]
fn test_malformed_command_is_skipped() {
    let file = commands_file(&[
        "vendor, 1, VND-1, , , Acme Works",
        "frobnicate, 1, X, , ,",
        "contract, 1, CT-1, VND-1, 100000000,",
    ]);

    let mut cmd = Command::new(cargo_bin!("paytrack"));
    cmd.arg(file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stdout(predicate::str::contains(
            "contract,CT-1,100000000,0,100000000",
        ));
}
