//! Whitelist file loading and matching semantics

use std::io::Write;

use oomguard::identity::ProcessIdentity;
use oomguard::whitelist::{Classification, MatchMode, Whitelist, MAX_ENTRY_LEN};

fn write_list(contents: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create whitelist");
    file.write_all(contents).expect("write whitelist");
    file.flush().expect("flush whitelist");
    file
}

#[test]
fn test_documented_scenario_from_file() {
    let file = write_list(b"# comment\n\n!sshd\nbash\n");
    let wl = Whitelist::load(file.path());

    assert_eq!(wl.classify("sshd"), Classification::Exempt);
    assert_eq!(wl.classify("sshdx"), Classification::Standard);
    assert_eq!(wl.classify("ba"), Classification::Exempt);
    assert_eq!(wl.classify("zsh"), Classification::Standard);
}

#[test]
fn test_sshd_entry_exempts_sh() {
    // The documented (and deliberate) substring direction: the configured
    // pattern contains the candidate.
    let file = write_list(b"sshd\n");
    let wl = Whitelist::load(file.path());
    assert_eq!(wl.classify("sh"), Classification::Exempt);
}

#[test]
fn test_missing_file_classifies_everything_standard() {
    let dir = tempfile::tempdir().unwrap();
    let wl = Whitelist::load(&dir.path().join("no_such_whitelist"));
    assert!(wl.is_empty());
    assert_eq!(wl.classify("sshd"), Classification::Standard);
    assert_eq!(wl.classify(""), Classification::Standard);
}

#[test]
fn test_unterminated_tail_never_grants_exemption() {
    let file = write_list(b"!sshd\nbash"); // no trailing newline
    let wl = Whitelist::load(file.path());
    assert_eq!(wl.len(), 1);
    assert_eq!(wl.classify("bash"), Classification::Standard);
    assert_eq!(wl.classify("sshd"), Classification::Exempt);
    assert_eq!(wl.rejected().len(), 1);
}

#[test]
fn test_overlong_entry_is_discarded() {
    let mut contents = vec![b'x'; MAX_ENTRY_LEN + 100];
    contents.push(b'\n');
    contents.extend_from_slice(b"bash\n");
    let file = write_list(&contents);
    let wl = Whitelist::load(file.path());

    assert_eq!(wl.len(), 1);
    assert_eq!(wl.classify("xxx"), Classification::Standard);
    assert_eq!(wl.classify("bash"), Classification::Exempt);
}

#[test]
fn test_first_matching_entry_wins() {
    let file = write_list(b"!bash\nbash\n");
    let wl = Whitelist::load(file.path());
    let hit = wl.match_candidate("bash").expect("exact entry matches");
    assert_eq!(hit.line, 1);
    assert_eq!(hit.mode, MatchMode::Exact);
}

#[test]
fn test_edits_take_effect_on_next_load() {
    let file = write_list(b"bash\n");
    assert_eq!(Whitelist::load(file.path()).classify("ba"), Classification::Exempt);

    std::fs::write(file.path(), b"zsh\n").unwrap();
    assert_eq!(Whitelist::load(file.path()).classify("ba"), Classification::Standard);
    assert_eq!(Whitelist::load(file.path()).classify("zs"), Classification::Exempt);
}

#[test]
fn test_directory_like_command_is_not_exempt() {
    // A cmdline ending in '/' produces an empty basename; that must not
    // substring-match its way past the whitelist.
    let file = write_list(b"sshd\n");
    let wl = Whitelist::load(file.path());
    let id = ProcessIdentity::from_cmdline(b"/opt/tool/\0");
    assert!(wl.match_any(id.candidates()).is_none());
}

#[test]
fn test_identity_candidates_match_against_entries() {
    let file = write_list(b"supervisord\n");
    let wl = Whitelist::load(file.path());

    // "sup" occurs inside the pattern; "-n" does not.
    let hit = wl.match_any(["sup", "-n"]);
    assert!(hit.is_some());
    let (entry, candidate) = hit.unwrap();
    assert_eq!(entry.pattern, "supervisord");
    assert_eq!(candidate, "sup");

    assert!(wl.match_any(["-n", "--daemon"]).is_none());
}
