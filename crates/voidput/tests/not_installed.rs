use voidput::{AgentError, CallSite, Frame};

#[test]
fn reporting_without_an_agent_is_an_error() {
    assert!(voidput::installed().is_none());

    let site = CallSite::put(Frame::new("acme/Orders", "record"));
    assert_eq!(
        voidput::report_call_site(&site),
        Err(AgentError::NotInstalled)
    );
}
