//! Numeric reply codes.
//!
//! Codes follow RFC 1459 section 6 and RFC 2812 section 5, plus the
//! Undernet SILENCE and the ircd-hybrid KNOCK numerics used by the modern
//! dialect.

pub type Reply = &'static str;

pub const WELCOME: Reply = "001";
pub const YOURHOST: Reply = "002";
pub const CREATED: Reply = "003";
pub const MYINFO: Reply = "004";
pub const ISUPPORT: Reply = "005";

pub const ENDOFSTATS: Reply = "219";
pub const UMODEIS: Reply = "221";
pub const SERVLIST: Reply = "234";
pub const SERVLISTEND: Reply = "235";
pub const STATSUPTIME: Reply = "242";
pub const STATSOLINE: Reply = "243";
pub const LUSERCLIENT: Reply = "251";
pub const LUSEROP: Reply = "252";
pub const LUSERUNKNOWN: Reply = "253";
pub const LUSERCHANNELS: Reply = "254";
pub const LUSERME: Reply = "255";
pub const ADMINME: Reply = "256";
pub const ADMINLOC1: Reply = "257";
pub const ADMINLOC2: Reply = "258";
pub const ADMINEMAIL: Reply = "259";
pub const TRACEEND: Reply = "262";
pub const SILELIST: Reply = "271";
pub const ENDOFSILELIST: Reply = "272";

pub const AWAY: Reply = "301";
pub const USERHOST: Reply = "302";
pub const ISON: Reply = "303";
pub const UNAWAY: Reply = "305";
pub const NOWAWAY: Reply = "306";
pub const WHOISUSER: Reply = "311";
pub const WHOISSERVER: Reply = "312";
pub const WHOISOPERATOR: Reply = "313";
pub const WHOWASUSER: Reply = "314";
pub const ENDOFWHO: Reply = "315";
pub const WHOISIDLE: Reply = "317";
pub const ENDOFWHOIS: Reply = "318";
pub const WHOISCHANNELS: Reply = "319";
pub const LISTSTART: Reply = "321";
pub const LIST: Reply = "322";
pub const LISTEND: Reply = "323";
pub const CHANNELMODEIS: Reply = "324";
pub const NOTOPIC: Reply = "331";
pub const TOPIC: Reply = "332";
pub const TOPICWHOTIME: Reply = "333";
pub const INVITING: Reply = "341";
pub const INVITELIST: Reply = "346";
pub const ENDOFINVITELIST: Reply = "347";
pub const EXCEPTLIST: Reply = "348";
pub const ENDOFEXCEPTLIST: Reply = "349";
pub const VERSION: Reply = "351";
pub const WHOREPLY: Reply = "352";
pub const NAMREPLY: Reply = "353";
pub const LINKS: Reply = "364";
pub const ENDOFLINKS: Reply = "365";
pub const ENDOFNAMES: Reply = "366";
pub const BANLIST: Reply = "367";
pub const ENDOFBANLIST: Reply = "368";
pub const ENDOFWHOWAS: Reply = "369";
pub const INFO: Reply = "371";
pub const MOTD: Reply = "372";
pub const ENDOFINFO: Reply = "374";
pub const MOTDSTART: Reply = "375";
pub const ENDOFMOTD: Reply = "376";
pub const YOUREOPER: Reply = "381";
pub const REHASHING: Reply = "382";
pub const TIME: Reply = "391";

pub const ERR_NOSUCHNICK: Reply = "401";
pub const ERR_NOSUCHSERVER: Reply = "402";
pub const ERR_NOSUCHCHANNEL: Reply = "403";
pub const ERR_CANNOTSENDTOCHAN: Reply = "404";
pub const ERR_TOOMANYCHANNELS: Reply = "405";
pub const ERR_WASNOSUCHNICK: Reply = "406";
pub const ERR_NOORIGIN: Reply = "409";
pub const ERR_INVALIDCAPCMD: Reply = "410";
pub const ERR_NORECIPIENT: Reply = "411";
pub const ERR_NOTEXTTOSEND: Reply = "412";
pub const ERR_UNKNOWNCOMMAND: Reply = "421";
pub const ERR_NOMOTD: Reply = "422";
pub const ERR_NONICKNAMEGIVEN: Reply = "431";
pub const ERR_ERRONEUSNICKNAME: Reply = "432";
pub const ERR_NICKNAMEINUSE: Reply = "433";
pub const ERR_USERNOTINCHANNEL: Reply = "441";
pub const ERR_NOTONCHANNEL: Reply = "442";
pub const ERR_USERONCHANNEL: Reply = "443";
pub const ERR_SUMMONDISABLED: Reply = "445";
pub const ERR_NOTREGISTERED: Reply = "451";
pub const ERR_NEEDMOREPARAMS: Reply = "461";
pub const ERR_ALREADYREGISTRED: Reply = "462";
pub const ERR_PASSWDMISMATCH: Reply = "464";
pub const ERR_KEYSET: Reply = "467";
pub const ERR_CHANNELISFULL: Reply = "471";
pub const ERR_UNKNOWNMODE: Reply = "472";
pub const ERR_INVITEONLYCHAN: Reply = "473";
pub const ERR_BANNEDFROMCHAN: Reply = "474";
pub const ERR_BADCHANNELKEY: Reply = "475";
pub const ERR_BADCHANMASK: Reply = "476";
pub const ERR_NOPRIVILEGES: Reply = "481";
pub const ERR_CHANOPRIVSNEEDED: Reply = "482";
pub const ERR_CANTKILLSERVER: Reply = "483";
pub const ERR_NOOPERHOST: Reply = "491";
pub const ERR_UMODEUNKNOWNFLAG: Reply = "501";
pub const ERR_USERSDONTMATCH: Reply = "502";
pub const ERR_SILELISTFULL: Reply = "511";

pub const KNOCK: Reply = "710";
pub const KNOCKDLVR: Reply = "711";
pub const ERR_CHANOPEN: Reply = "713";
pub const ERR_KNOCKONCHAN: Reply = "714";
