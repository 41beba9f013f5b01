use super::*;

#[test]
fn parses_list_with_paging() {
    let cli = Cli::try_parse_from(["backoffice-cli", "list", "invoices", "--page", "3", "--search", "acme"]).unwrap();
    let Command::List(args) = cli.command else { panic!("expected list") };
    assert_eq!(args.resource, "invoices");
    assert_eq!(args.page, 3);
    assert_eq!(args.search, "acme");
    assert_eq!(args.limit, None);
}

#[test]
fn parses_decision_words() {
    let cli = Cli::try_parse_from(["backoffice-cli", "approvals", "decide", "12", "reject", "--remarks", "late"]).unwrap();
    let Command::Approvals(ApprovalsCommand { command: ApprovalsSubcommand::Decide { decision, remarks, .. } }) =
        cli.command
    else {
        panic!("expected decide")
    };
    assert_eq!(decision, Decision::Reject);
    assert_eq!(remarks, "late");

    assert!(Cli::try_parse_from(["backoffice-cli", "approvals", "decide", "12", "close"]).is_err());
}

#[test]
fn create_accepts_any_status() {
    let cli = Cli::try_parse_from([
        "backoffice-cli", "approvals", "create", "7", "--step-no", "2", "--step-name", "Legal", "--status", "closed",
    ])
    .unwrap();
    let Command::Approvals(ApprovalsCommand { command: ApprovalsSubcommand::Create { status, .. } }) = cli.command
    else {
        panic!("expected create")
    };
    assert_eq!(status, ApprovalStatus::Closed);
}

#[test]
fn unknown_resource_lists_known_paths() {
    let err = resolve("widgets").unwrap_err();
    assert!(err.to_string().contains("contractor-payments"));
    assert_eq!(resolve(" banks ").unwrap(), Resource::BANKS);
}

#[test]
fn table_pads_columns() {
    let rendered = render_table(&["ID", "NAME"], &[vec!["1".into(), "Acme".into()], vec!["100".into(), "B".into()]]);
    assert_eq!(rendered, "ID   NAME\n1    Acme\n100  B\n");
    assert!(render_table(&["ID"], &[]).ends_with("(no records)\n"));
}
