use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cwcli(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cwcli").unwrap();
    cmd.arg("--home").arg(home.path());
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("cwcli").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Command line client for cw-sdk chains"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("store-instantiate"));
}

#[test]
fn test_subcommand_help() {
    let mut cmd = Command::cargo_bin("cwcli").unwrap();
    cmd.arg("transfer")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--gas-limit"))
        .stdout(predicate::str::contains("--from"));
}

#[test]
fn test_version_flag() {
    let mut cmd = Command::cargo_bin("cwcli").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cwcli"));
}

#[test]
fn test_config_init_and_show() {
    let home = TempDir::new().unwrap();

    cwcli(&home).args(["config", "init"]).assert().success();
    assert!(home.path().join("config.toml").exists());

    cwcli(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("endpoint = \"http://127.0.0.1:26657\""))
        .stdout(predicate::str::contains("gas_adjustment = 1.4"));
}

#[test]
fn test_config_set_persists() {
    let home = TempDir::new().unwrap();

    cwcli(&home)
        .args(["config", "set", "gas_price", "0.025uatom"])
        .assert()
        .success();
    cwcli(&home)
        .args(["config", "set", "chain_id", "test-chain-1"])
        .assert()
        .success();

    let raw = std::fs::read_to_string(home.path().join("config.toml")).unwrap();
    assert!(raw.contains("gas_price = \"0.025uatom\""));
    assert!(raw.contains("chain_id = \"test-chain-1\""));
}

#[test]
fn test_config_set_rejects_bad_values() {
    let home = TempDir::new().unwrap();

    cwcli(&home)
        .args(["config", "set", "no_such_key", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown configuration key"));

    cwcli(&home)
        .args(["config", "set", "gas_adjustment", "0.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("gas_adjustment"));
}

#[test]
fn test_keys_new_and_show() {
    let home = TempDir::new().unwrap();

    let output = cwcli(&home)
        .env("CWCLI_PASSWORD", "correct horse battery staple")
        .args(["keys", "new", "alice", "--key-type", "ed25519"])
        .assert()
        .success()
        .stdout(predicate::str::contains("address: 0x"))
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).unwrap();
    let address = stdout
        .lines()
        .find_map(|line| line.strip_prefix("address: "))
        .unwrap()
        .to_string();

    assert!(home.path().join("keys").join("alice.json").exists());

    cwcli(&home)
        .args(["keys", "show", "alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains(address));

    // refuses to overwrite
    cwcli(&home)
        .env("CWCLI_PASSWORD", "another")
        .args(["keys", "new", "alice"])
        .assert()
        .failure();
}

#[test]
fn test_keys_new_rejects_unknown_type() {
    let home = TempDir::new().unwrap();
    cwcli(&home)
        .env("CWCLI_PASSWORD", "pw")
        .args(["keys", "new", "bob", "--key-type", "rsa"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown key type"));
}

#[test]
fn test_transfer_requires_arguments() {
    let home = TempDir::new().unwrap();
    cwcli(&home)
        .arg("transfer")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "required arguments were not provided",
        ));
}

#[test]
fn test_invalid_address_is_rejected() {
    let home = TempDir::new().unwrap();
    cwcli(&home)
        .args(["balances", "not-an-address"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_unreachable_node_fails() {
    let home = TempDir::new().unwrap();
    cwcli(&home)
        .args(["--node", "http://127.0.0.1:1", "info"])
        .assert()
        .failure();
}
