use crate::http::PostTarget;
use crate::tests::mock::{fast_config, modem, run};
use alloc::string::ToString;

#[test]
fn test_post_without_target() {
    let (modem, serial) = modem(fast_config());

    run(&serial, &modem, modem.http_post("{}")).unwrap();

    assert_eq!(vec!["AT+HTTPCLIENT=3,1,\"\",,,2,\"{}\"".to_string()], serial.get_commands());
}

#[test]
fn test_post_to_target() {
    let (modem, serial) = modem(fast_config());
    modem.http_set_target("https://maker.ifttt.com", "/trigger/door/with/key/abc");

    run(&serial, &modem, modem.http_post("{\"value1\":\"open\"}")).unwrap();

    assert_eq!(
        vec!["AT+HTTPCLIENT=3,1,\"https://maker.ifttt.com/trigger/door/with/key/abc\",,,2,\"{\"value1\":\"open\"}\""
            .to_string()],
        serial.get_commands()
    );
}

#[test]
fn test_set_target_replaces_previous() {
    let (modem, _serial) = modem(fast_config());
    modem.http_set_target("http://first", "/a");
    modem.http_set_target("http://second", "/b");

    assert_eq!(
        PostTarget {
            host: "http://second".to_string(),
            path: "/b".to_string()
        },
        modem.http_target()
    );
    assert_eq!("http://second/b", modem.http_target().url());
}
